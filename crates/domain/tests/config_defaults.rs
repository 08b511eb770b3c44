use lt_domain::config::{Config, StoreBackend, SearchTarget};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config.server.cors.allowed_origins.contains(&"http://localhost:*".to_string()));
    assert!(config.server.cors.allowed_origins.contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn full_config_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080

[server.cors]
allowed_origins = ["https://tutor.example.com"]

[llm]
model = "gpt-4o-mini"
temperature = 0.2

[search]
project_id = "lex-123"
engine_id = "manuales"
target = "engines"
max_passages = 2

[identity]
url = "https://abcd.supabase.co"
anon_key = "anon"

[store]
backend = "memory"

[chat]
max_history_messages = 10
persist_partial_on_disconnect = false

[transcription]
enabled = false
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert!(config.search.enabled());
    assert_eq!(config.search.target, SearchTarget::Engines);
    assert_eq!(config.search.max_passages, 2);
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.chat.max_history_messages, 10);
    assert!(!config.chat.persist_partial_on_disconnect);
    assert!(!config.transcription.enabled);
    assert!(config.validate().iter().all(|e| e.field != "identity.anon_key"));
}

#[test]
fn chat_defaults() {
    let config = Config::default();
    assert_eq!(config.chat.default_student_name, "estudiante");
    assert_eq!(config.chat.max_history_messages, 20);
    assert!(config.chat.persist_partial_on_disconnect);
}
