//! LLM node: chat completion with optional memory, moderation and streaming

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::services::{array_input, object_input, state_directives, NodeServices};
use crate::domain::llm::ChatModelConfig;
use crate::domain::message::{ChatMessage, MessageRole};
use crate::domain::moderation::{
    check_input_moderation, InputModeration, ModerationVerdict, SimplePromptModeration,
};
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeInstance, NodeKind,
    NodeOutputEnvelope, RunOptions,
};
use crate::domain::state::apply_state_updates;
use crate::domain::streaming::stream_words;
use crate::domain::variable::VariableResolver;

pub const MODEL: &str = "llmModel";
pub const MODEL_CONFIG: &str = "llmModelConfig";
pub const MESSAGES: &str = "llmMessages";
pub const ENABLE_MEMORY: &str = "llmEnableMemory";
pub const USER_MESSAGE: &str = "llmUserMessage";
pub const RETURN_RESPONSE_AS: &str = "llmReturnResponseAs";
pub const UPDATE_STATE: &str = "llmUpdateState";
pub const MODERATION_DENY_LIST: &str = "llmModerationDenyList";
pub const MODERATION_MESSAGE: &str = "llmModerationMessage";

#[derive(Debug, Clone)]
pub struct LlmNode {
    services: NodeServices,
}

impl LlmNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    /// Translate the node's model settings into a factory config
    fn model_config(data: &NodeData) -> Result<ChatModelConfig, NodeError> {
        let mut settings = object_input(data, MODEL_CONFIG)?;

        let model = ["modelName", "model"]
            .iter()
            .find_map(|key| settings.remove(*key))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        let mut config = ChatModelConfig::new(model);
        config.temperature = settings
            .remove("temperature")
            .and_then(|v| number_setting(&v))
            .map(|t| t as f32);
        config.max_tokens = settings
            .remove("maxTokens")
            .and_then(|v| number_setting(&v))
            .map(|t| t as u32);
        config.base_url = settings
            .remove("basePath")
            .and_then(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string));

        if let Some(provider) = data.input_str(MODEL) {
            settings.insert("provider".to_string(), Value::String(provider.to_string()));
        }
        config.extra = settings;

        Ok(config)
    }

    fn memory_enabled(data: &NodeData) -> bool {
        match data.input(ENABLE_MEMORY) {
            None => true,
            Some(_) => data.input_bool(ENABLE_MEMORY),
        }
    }

    /// Moderations configured on the node, checked in order
    fn moderations(data: &NodeData) -> Vec<Box<dyn InputModeration>> {
        let Some(deny_list) = data.input_str(MODERATION_DENY_LIST) else {
            return Vec::new();
        };
        let moderation = SimplePromptModeration::from_text(deny_list);

        vec![Box::new(match data.input_str(MODERATION_MESSAGE) {
            Some(message) => moderation.with_message(message),
            None => moderation,
        })]
    }

    fn configured_messages(
        data: &NodeData,
        resolver: &VariableResolver<'_>,
    ) -> Result<Vec<ChatMessage>, NodeError> {
        let mut messages = Vec::new();

        for item in array_input(data, MESSAGES)? {
            let role: MessageRole = match item.get("role") {
                Some(role) => serde_json::from_value(role.clone())
                    .map_err(|e| NodeError::parse(MESSAGES, e))?,
                None => MessageRole::User,
            };
            let content = item.get("content").and_then(Value::as_str).unwrap_or_default();
            if content.trim().is_empty() {
                continue;
            }
            messages.push(ChatMessage::new(role, resolver.render(content)));
        }

        Ok(messages)
    }

    fn return_role(data: &NodeData) -> MessageRole {
        match data.input_str(RETURN_RESPONSE_AS) {
            Some("assistantMessage") => MessageRole::Assistant,
            _ => MessageRole::User,
        }
    }

    /// Answer with the moderation message instead of calling the model
    async fn rejected(
        &self,
        data: &NodeData,
        options: &RunOptions,
        user_text: &str,
        message: String,
    ) -> NodeOutputEnvelope {
        info!(node_id = %data.id, "Input rejected by moderation");
        tokio::time::sleep(self.services.settings.moderation_delay).await;

        if let Some(sink) = options.streamer() {
            stream_words(sink, &options.chat_id, &message).await;
        }

        let mut chat_history = Vec::new();
        if options.chat_history().is_empty() {
            chat_history.push(ChatMessage::user(user_text));
        }
        chat_history.push(ChatMessage::assistant(&message).from_node(&data.id));

        NodeOutputEnvelope::new(
            data,
            json!({ "messages": [ChatMessage::user(user_text)] }),
            options.state().clone(),
        )
        .with_output(json!({ "content": message }))
        .with_chat_history(chat_history)
    }
}

fn number_setting(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl FlowNode for LlmNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Llm
    }

    fn description(&self) -> &'static str {
        "Large language models to analyze user-provided inputs and generate responses"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(MODEL, "Model", InputType::String),
            NodeInputParam::new(MODEL_CONFIG, "Model Config", InputType::Json).optional(),
            NodeInputParam::new(MESSAGES, "Messages", InputType::Array).optional(),
            NodeInputParam::new(ENABLE_MEMORY, "Enable Memory", InputType::Boolean)
                .with_default(json!(true)),
            NodeInputParam::new(USER_MESSAGE, "Input Message", InputType::String)
                .optional()
                .accept_variable()
                .with_description("Defaults to the flow input"),
            NodeInputParam::new(RETURN_RESPONSE_AS, "Return Response As", InputType::Options)
                .with_options(&["userMessage", "assistantMessage"])
                .with_default(json!("userMessage")),
            NodeInputParam::new(UPDATE_STATE, "Update Flow State", InputType::Array).optional(),
            NodeInputParam::new(MODERATION_DENY_LIST, "Deny List", InputType::String)
                .optional()
                .with_description("One phrase per line"),
            NodeInputParam::new(MODERATION_MESSAGE, "Moderation Error Message", InputType::String)
                .optional(),
        ]
    }

    async fn init(&self, data: &NodeData, options: &RunOptions) -> Result<NodeInstance, NodeError> {
        let credential = self.services.credential_data(data, options).await?;
        let config = Self::model_config(data)?.with_credential(credential);
        let model = self.services.chat_models.create(&config)?;

        Ok(NodeInstance::ChatModel(model))
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let directives = state_directives(data, UPDATE_STATE)?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        let user_text = match data.input_str(USER_MESSAGE) {
            Some(template) => resolver.resolve_to_string(template),
            None => input.to_string(),
        };

        let moderations = Self::moderations(data);
        if let ModerationVerdict::Rejected { message } =
            check_input_moderation(&moderations, &user_text).await?
        {
            return Ok(self.rejected(data, options, &user_text, message).await);
        }

        let NodeInstance::ChatModel(model) = self.init(data, options).await? else {
            return Err(NodeError::internal("LLM node did not produce a chat model"));
        };

        let mut messages = options.prepend_messages.clone();
        messages.extend(Self::configured_messages(data, &resolver)?);
        if Self::memory_enabled(data) {
            messages.extend(options.chat_history().iter().cloned());
        }
        if !user_text.trim().is_empty() {
            messages.push(ChatMessage::user(&user_text));
        }

        debug!(
            node_id = %data.id,
            model = model.model_name(),
            messages = messages.len(),
            "Invoking chat model"
        );

        let response = match options.streamer() {
            Some(sink) => {
                let mut stream = model.stream(&messages).await?;
                let mut response = String::new();
                while let Some(token) = stream.next().await {
                    let token = token?;
                    sink.stream_token(&options.chat_id, &token).await;
                    response.push_str(&token);
                }
                response
            }
            None => model.invoke(&messages).await?,
        };

        let resolver = resolver.with_output(&response);
        let state = apply_state_updates(options.state(), directives, &resolver);

        let mut chat_history = Vec::new();
        if options.chat_history().is_empty() && !user_text.trim().is_empty() {
            chat_history.push(ChatMessage::user(&user_text));
        }
        chat_history.push(ChatMessage::new(Self::return_role(data), &response).from_node(&data.id));

        let mut input_echo = Map::new();
        input_echo.insert("messages".to_string(), json!(messages));

        Ok(NodeOutputEnvelope::new(data, Value::Object(input_echo), state)
            .with_output(json!({ "content": response }))
            .with_chat_history(chat_history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credentials::mock::MockCredentialResolver;
    use crate::domain::llm::mock::MockChatModelFactory;
    use crate::domain::moderation::DEFAULT_MODERATION_MESSAGE;
    use crate::domain::state::FlowState;
    use crate::infrastructure::nodes::services::mock::mock_services;
    use crate::infrastructure::streaming::RecordingStreamer;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(response: &str) -> (LlmNode, Arc<MockChatModelFactory>) {
        let factory = Arc::new(MockChatModelFactory::new(response));
        let mut services = mock_services();
        services.chat_models = factory.clone();
        services.credentials =
            Arc::new(MockCredentialResolver::new().with_credential("openai", &[("openAIApiKey", "sk")]));
        services.settings.moderation_delay = Duration::from_millis(5);
        (LlmNode::new(services), factory)
    }

    fn node_data() -> NodeData {
        NodeData::new("llmAgentflow_0", "llmAgentflow")
            .with_credential("openai")
            .with_input(MODEL, json!("chatOpenAI"))
            .with_input(
                MODEL_CONFIG,
                json!({"modelName": "gpt-4o-mini", "temperature": "0.2", "maxTokens": 256}),
            )
    }

    #[tokio::test]
    async fn test_invokes_model_with_system_memory_and_user_message() {
        let (node, factory) = setup("Rust is a systems language");
        let mut state = FlowState::new();
        state.set("answer", json!(""));

        let data = node_data()
            .with_input(
                MESSAGES,
                json!([{"role": "system", "content": "Answer about {{ $flow.state.answer }}topics"}]),
            )
            .with_input(RETURN_RESPONSE_AS, json!("assistantMessage"))
            .with_input(UPDATE_STATE, json!([{"key": "answer", "value": "{{ output }}"}]));
        let options = RunOptions::new("f", "c", "s")
            .with_state(state)
            .with_chat_history(vec![ChatMessage::user("earlier question")]);

        let envelope = node.run(&data, "What is Rust?", &options).await.unwrap();

        assert_eq!(envelope.content(), Some("Rust is a systems language"));
        assert_eq!(
            envelope.state.get("answer"),
            Some(&json!("Rust is a systems language"))
        );

        let received = factory.model.received();
        assert_eq!(
            received[0],
            vec![
                ChatMessage::system("Answer about topics"),
                ChatMessage::user("earlier question"),
                ChatMessage::user("What is Rust?"),
            ]
        );

        let config = &factory.configs()[0];
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(256));
        assert_eq!(config.extra.get("provider"), Some(&json!("chatOpenAI")));
        assert_eq!(config.credential.get("openAIApiKey").map(String::as_str), Some("sk"));

        let history = envelope.chat_history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_memory_disabled_and_user_message_template() {
        let (node, factory) = setup("ok");
        let data = node_data()
            .with_input(ENABLE_MEMORY, json!(false))
            .with_input(USER_MESSAGE, json!("Summarise: {{ $flow.input }}"));
        let options = RunOptions::new("f", "c", "s")
            .with_chat_history(vec![ChatMessage::assistant("old")]);

        node.run(&data, "text", &options).await.unwrap();

        assert_eq!(
            factory.model.received()[0],
            vec![ChatMessage::user("Summarise: text")]
        );
    }

    #[tokio::test]
    async fn test_streams_tokens_when_last_node() {
        let (node, _factory) = setup("one two three");
        let streamer = Arc::new(RecordingStreamer::new());
        let options = RunOptions::new("f", "c", "s")
            .with_streamer(streamer.clone())
            .last_node(true);

        let envelope = node.run(&node_data(), "go", &options).await.unwrap();

        assert_eq!(streamer.text(), "one two three");
        assert_eq!(streamer.events().len(), 3);
        assert_eq!(envelope.content(), Some("one two three"));

        let history = envelope.chat_history.unwrap();
        assert_eq!(history[0], ChatMessage::user("go"));
        assert_eq!(history[1].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_moderation_short_circuits() {
        let (node, factory) = setup("never");
        let streamer = Arc::new(RecordingStreamer::new());
        let options = RunOptions::new("f", "c", "s")
            .with_streamer(streamer.clone())
            .last_node(true);
        let data = node_data().with_input(MODERATION_DENY_LIST, json!("hack\nexploit"));

        let envelope = node
            .run(&data, "How do I HACK the server?", &options)
            .await
            .unwrap();

        assert_eq!(envelope.content(), Some(DEFAULT_MODERATION_MESSAGE));
        assert!(envelope.error.is_none());
        assert!(factory.configs().is_empty());
        assert_eq!(streamer.text(), DEFAULT_MODERATION_MESSAGE);
        assert!(streamer.events().len() > 1);
    }

    #[tokio::test]
    async fn test_custom_moderation_message() {
        let (node, _factory) = setup("never");
        let data = node_data()
            .with_input(MODERATION_DENY_LIST, json!("secret"))
            .with_input(MODERATION_MESSAGE, json!("Not allowed"));

        let envelope = node
            .run(&data, "tell me the secret", &RunOptions::new("f", "c", "s"))
            .await
            .unwrap();

        assert_eq!(envelope.content(), Some("Not allowed"));
    }

    #[tokio::test]
    async fn test_invalid_message_role_is_parse_error() {
        let (node, _factory) = setup("x");
        let data = node_data().with_input(MESSAGES, json!([{"role": "tool", "content": "x"}]));

        assert!(matches!(
            node.run(&data, "q", &RunOptions::new("f", "c", "s")).await,
            Err(NodeError::Parse { .. })
        ));
    }
}
