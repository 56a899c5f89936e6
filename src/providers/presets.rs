use serde::Serialize;

/// A known OpenAI-compatible endpoint offered to users as a starting point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub models: &'static [&'static str],
}

/// Listed in recommendation order; the last entry is the free-form one.
pub const PROVIDER_PRESETS: &[ProviderPreset] = &[
    ProviderPreset {
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        models: &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-4", "gpt-3.5-turbo"],
    },
    ProviderPreset {
        name: "Moonshot (Kimi)",
        base_url: "https://api.moonshot.cn/v1",
        models: &["moonshot-v1-128k", "moonshot-v1-32k", "moonshot-v1-8k"],
    },
    ProviderPreset {
        name: "DeepSeek",
        base_url: "https://api.deepseek.com/v1",
        models: &["deepseek-chat", "deepseek-coder"],
    },
    ProviderPreset {
        name: "Zhipu",
        base_url: "https://open.bigmodel.cn/api/paas/v4",
        models: &["glm-4-plus", "glm-4", "glm-4-flash"],
    },
    ProviderPreset {
        name: "Qwen",
        base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
        models: &["qwen-turbo", "qwen-plus", "qwen-max"],
    },
    ProviderPreset {
        name: "Baichuan",
        base_url: "https://api.baichuan-ai.com/v1",
        models: &["Baichuan4", "Baichuan3-Turbo", "Baichuan2-Turbo"],
    },
    ProviderPreset {
        name: "Ollama (local)",
        base_url: "http://localhost:11434/v1",
        models: &["llama3", "llama2", "mistral", "codellama", "qwen2"],
    },
    ProviderPreset {
        name: "Custom",
        base_url: "",
        models: &[],
    },
];
