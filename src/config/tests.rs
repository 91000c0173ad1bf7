#[cfg(test)]
mod tests {
    use crate::config::{
        Config, EmbeddingConfig, EmbeddingProvider, KnowledgeBaseConfig, LLMConfig, LLMProvider,
        RetrievalConfig,
    };
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.output_path, PathBuf::from("output/result.md"));
        assert_eq!(config.log_dir, PathBuf::from("output/log"));
        assert!(!config.verbose);
    }

    #[test]
    fn test_llm_provider_default() {
        let provider = LLMProvider::default();
        assert_eq!(provider, LLMProvider::OpenAI);
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!(
            "openai".parse::<LLMProvider>().unwrap(),
            LLMProvider::OpenAI
        );
        assert_eq!(
            "dashscope".parse::<LLMProvider>().unwrap(),
            LLMProvider::OpenAI
        );
        assert_eq!(
            "DeepSeek".parse::<LLMProvider>().unwrap(),
            LLMProvider::DeepSeek
        );
        assert_eq!(
            "ollama".parse::<LLMProvider>().unwrap(),
            LLMProvider::Ollama
        );

        assert!("invalid".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_llm_provider_display() {
        assert_eq!(LLMProvider::OpenAI.to_string(), "openai");
        assert_eq!(LLMProvider::Moonshot.to_string(), "moonshot");
        assert_eq!(LLMProvider::Anthropic.to_string(), "anthropic");
        assert_eq!(LLMProvider::Gemini.to_string(), "gemini");
    }

    #[test]
    fn test_embedding_provider_from_str() {
        assert_eq!(
            "hash".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Hash
        );
        assert_eq!(
            "ollama".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::Ollama
        );
        assert_eq!(
            "dashscope".parse::<EmbeddingProvider>().unwrap(),
            EmbeddingProvider::OpenAI
        );
        assert!("word2vec".parse::<EmbeddingProvider>().is_err());
        assert_eq!(EmbeddingProvider::Hash.to_string(), "hash");
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();

        assert_eq!(config.provider, LLMProvider::OpenAI);
        // api_key may be empty if env var is not set
        assert!(!config.api_base_url.is_empty());
        assert!(!config.model.is_empty());
        assert_eq!(config.temperature, 0.0);
        assert_eq!(config.timeout_seconds, 120);
    }

    #[test]
    fn test_embedding_config_default() {
        let config = EmbeddingConfig::default();

        assert_eq!(config.provider, EmbeddingProvider::Hash);
        assert_eq!(config.dimension, 384);
    }

    #[test]
    fn test_retrieval_config_default() {
        let config = RetrievalConfig::default();

        assert_eq!(config.top_k, 3);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.context_max_chars, 600);
    }

    #[test]
    fn test_knowledge_base_paths() {
        let config = KnowledgeBaseConfig {
            persist_dir: PathBuf::from("/tmp/kb"),
            ..Default::default()
        };

        assert_eq!(config.store_path(), PathBuf::from("/tmp/kb/knowledge_base.json"));
        assert_eq!(config.registry_path(), PathBuf::from("/tmp/kb/registry.json"));
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.chunk_overlap, 100);
    }

    #[test]
    fn test_config_from_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("multi_search.toml");

        let config_content = r#"
verbose = true
output_path = "out/answer.md"

[llm]
provider = "ollama"
model = "qwen3:0.6b"

[retrieval]
top_k = 5

[knowledge_base]
persist_dir = "/var/kb"
"#;
        std::fs::write(&config_path, config_content).unwrap();

        let config = Config::from_file(&config_path).unwrap();

        assert!(config.verbose);
        assert_eq!(config.output_path, PathBuf::from("out/answer.md"));
        assert_eq!(config.llm.provider, LLMProvider::Ollama);
        assert_eq!(config.llm.model, "qwen3:0.6b");
        assert_eq!(config.llm.timeout_seconds, 120);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.retry_attempts, 3);
        assert_eq!(config.knowledge_base.persist_dir, PathBuf::from("/var/kb"));
        assert_eq!(config.knowledge_base.data_dir, PathBuf::from("data"));
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
    }

    #[test]
    fn test_config_from_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "[llm\nprovider = ").unwrap();

        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn test_config_load_explicit_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");

        assert!(Config::load(Some(&missing)).is_err());
    }
}
