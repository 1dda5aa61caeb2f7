//! 视觉推理客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 默认指向 Gemini 的 OpenAI 兼容端点
//! - 图片以 base64 data URL 形式随用户消息发送

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use base64::{engine::general_purpose, Engine as _};
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, RemoteError};
use crate::infrastructure::{RemoteSolver, SolveRequest};

/// 视觉推理客户端
///
/// 构造时检查凭证；缺少 API key 是唯一的构造期致命错误
pub struct VisionClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl std::fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionClient")
            .field("model_name", &self.model_name)
            .finish_non_exhaustive()
    }
}

impl VisionClient {
    /// 创建新的视觉推理客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        if config.gemini_api_key.trim().is_empty() {
            return Err(AppError::missing_credentials("GEMINI_API_KEY"));
        }

        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.gemini_api_key)
            .with_api_base(&config.api_base_url);

        Ok(Self {
            client: Client::with_config(openai_config),
            model_name: config.model_name.clone(),
        })
    }

    async fn send_image(&self, request: SolveRequest<'_>) -> anyhow::Result<String> {
        debug!(
            "调用推理 API，模型: {}，题目: {}，图片大小: {} 字节",
            self.model_name,
            request.identity,
            request.payload.len()
        );

        let content_parts = vec![
            ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: request.prompt.to_string(),
                },
            ),
            ChatCompletionRequestUserMessageContentPart::ImageUrl(
                ChatCompletionRequestMessageContentPartImage {
                    image_url: ImageUrl {
                        url: data_url(request.payload_kind, request.payload),
                        detail: Some(ImageDetail::High),
                    },
                },
            ),
        ];

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
            .build()?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .build()?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("推理 API 调用失败 ({}): {}", request.identity, e);
            RemoteError::CallFailed {
                model: self.model_name.clone(),
                message: e.to_string(),
            }
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| RemoteError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        debug!("推理 API 调用成功 ({})", request.identity);
        Ok(content.trim().to_string())
    }

    /// 列出模型作为可达性检查：不消耗推理额度，同时验证 API key 与端点
    async fn check_reachable(&self) -> anyhow::Result<()> {
        let models = self.client.models().list().await.map_err(|e| RemoteError::Unreachable {
            message: e.to_string(),
        })?;
        debug!("推理服务可达，可用模型数: {}", models.data.len());
        Ok(())
    }
}

impl RemoteSolver for VisionClient {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn solve<'a>(&'a self, request: SolveRequest<'a>) -> BoxFuture<'a, anyhow::Result<String>> {
        Box::pin(self.send_image(request))
    }

    fn probe(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(self.check_reachable())
    }
}

/// 构建 `data:<mime>;base64,<...>` 形式的图片地址
fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_fails_at_construction() {
        let config = Config {
            gemini_api_key: "   ".to_string(),
            ..Default::default()
        };
        let err = VisionClient::new(&config).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_client_uses_configured_model() {
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            model_name: "gemini-test".to_string(),
            ..Default::default()
        };
        let client = VisionClient::new(&config).unwrap();
        assert_eq!(client.name(), "gemini-test");
    }

    #[tokio::test]
    async fn test_reachability_check_reports_invalid_endpoint() {
        // 非法地址在发出请求前就失败，不依赖网络
        let config = Config {
            gemini_api_key: "test-key".to_string(),
            api_base_url: "not a url".to_string(),
            ..Default::default()
        };
        let client = VisionClient::new(&config).unwrap();

        let err = client.probe().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RemoteError>(),
            Some(RemoteError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_data_url_encoding() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
