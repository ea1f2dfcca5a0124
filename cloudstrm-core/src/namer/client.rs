use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::descriptor::FolderDescriptor;
use crate::{Result, StrmError};

/// Default chat-completions endpoint
pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";

/// Default model name sent with each request
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Request timeout for oracle calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Text-generation service the namer talks to.
///
/// Implementations turn a prompt into the raw generated text. They are
/// expected to be blocking and bounded by a timeout.
pub trait CompletionBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Connection settings for an OpenAI-compatible chat-completions API
#[derive(Clone)]
pub struct ChatApiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ChatApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatApiConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ChatApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Blocking HTTP backend for OpenAI-compatible chat-completions APIs
pub struct ChatApiBackend {
    config: ChatApiConfig,
    client: reqwest::blocking::Client,
}

impl ChatApiBackend {
    pub fn new(config: ChatApiConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

impl CompletionBackend for ChatApiBackend {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: 0.3,
            max_tokens: 500,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(StrmError::Http(format!("naming API returned {}", status)));
        }

        let body: ChatResponse = response.json()?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```(?:json)?\s*|\s*```$").unwrap());

/// Parse the oracle's generated text into a descriptor.
///
/// Leading/trailing markdown code fences are stripped first.
pub fn parse_descriptor(text: &str) -> Result<FolderDescriptor> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StrmError::Oracle("empty response".to_string()));
    }
    let body = CODE_FENCE.replace_all(trimmed, "");
    Ok(serde_json::from_str(body.trim())?)
}

/// Prompt sent for one folder lookup
pub fn build_prompt(folder_name: &str, sample_filename: &str) -> String {
    format!(
        r#"你是媒体文件命名专家。根据文件夹名和文件名，生成MoviePilot标准文件名和文件夹名。

文件夹: {folder_name}
文件名: {sample_filename}

规则:
1. 识别类型(电影/剧集)
2. 提取中英文标题、年份
3. 剧集提取S##E##
4. 保留质量(4K/2160p/1080p/H265)
5. 保留音频(DDP5.1/Atmos/AAC)
6. 对于包含特殊字符或难以解析的中文标题：
   - 尝试识别并还原可能被拆分的汉字部件
   - 参考已知影视作品数据库进行匹配
   - 优先考虑完整的中文剧名而非字面拆分
7. 季数识别：
   - "第X季"格式优先识别为季节信息
   - 括号中的数字优先识别为年份
8. 文件夹命名规则：
   - 电影: "中文标题 英文标题 (年份)"
   - 剧集: "中文标题 英文标题 (年份)"
   - 必须包含年份，格式为 (YYYY)

输出JSON(纯JSON,不要markdown):
{{
  "type": "movie或tv",
  "chinese_title": "中文标题",
  "english_title": "英文标题",
  "year": "年份",
  "season": "S##(仅剧集)",
  "episode": "E##(仅剧集)",
  "quality": "质量",
  "audio": "音频",
  "other": "其他",
  "folder_name": "标准化的文件夹名称"
}}

示例:
输入: 文件夹="飞驰人生2 (2024) 4K", 文件="Pegasus.2.2024.2160p.WEB-DL.H265.DDP5.1.mkv"
输出: {{"type":"movie","chinese_title":"飞驰人生2","english_title":"Pegasus 2","year":"2024","quality":"4K 2160p H265","audio":"DDP5.1","other":"WEB-DL","folder_name":"飞驰人生2 Pegasus 2 (2024)"}}

现在分析:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namer::MediaType;

    #[test]
    fn test_debug_hides_api_key() {
        let config = ChatApiConfig::new("sk-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains(DEFAULT_MODEL));
    }

    #[test]
    fn test_parse_plain_json() {
        let d = parse_descriptor(r#"{"type":"movie","chinese_title":"流浪地球","year":"2023"}"#)
            .unwrap();
        assert_eq!(d.media_type, MediaType::Movie);
        assert_eq!(d.chinese_title, "流浪地球");
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let text = "```json\n{\"type\":\"tv\",\"chinese_title\":\"示例剧\"}\n```";
        let d = parse_descriptor(text).unwrap();
        assert_eq!(d.media_type, MediaType::Tv);

        let bare = "```\n{\"type\":\"tv\"}\n```\n";
        assert!(parse_descriptor(bare).is_ok());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_descriptor("").is_err());
        assert!(parse_descriptor("I cannot help with that").is_err());
    }

    #[test]
    fn test_prompt_embeds_inputs() {
        let prompt = build_prompt("示例剧 (2022)", "S01E01.mkv");
        assert!(prompt.contains("文件夹: 示例剧 (2022)"));
        assert!(prompt.contains("文件名: S01E01.mkv"));
        assert!(prompt.contains(r#""folder_name": "标准化的文件夹名称""#));
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            model: DEFAULT_MODEL,
            messages: [ChatMessage { role: "user", content: "hi" }],
            temperature: 0.3,
            max_tokens: 500,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "deepseek-chat");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["max_tokens"], 500);
    }

    #[test]
    fn test_response_content_extraction() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"type\":\"movie\"}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let content = parsed.choices[0].message.content.clone().unwrap();
        assert!(parse_descriptor(&content).is_ok());
    }
}
