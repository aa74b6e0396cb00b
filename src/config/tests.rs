use super::*;
use std::path::PathBuf;

#[test]
fn mask_secret_keeps_last_four() {
    assert_eq!(mask_secret("sk-abcdefghijkl"), "***********ijkl");
    assert_eq!(mask_secret("short"), "*****");
    assert_eq!(mask_secret(""), "");
}

#[test]
fn rendered_config_never_contains_the_key() {
    let mut config = Config {
        base_dir: PathBuf::from("/project"),
        ..Config::default()
    };
    config.openai.api_key = Some("sk-verysecretvalue1234".to_string());

    let rendered = render_config(&config);
    assert!(!rendered.contains("sk-verysecretvalue1234"));
    assert!(rendered.contains("1234"));
    assert!(rendered.contains("text-embedding-ada-002"));
    assert!(rendered.contains("knowledge_base"));
}

#[test]
fn rendered_config_reports_missing_key() {
    let rendered = render_config(&Config::default());
    assert!(rendered.contains("(not set)"));
}
