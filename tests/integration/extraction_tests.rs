//! Code extraction feeding the execution pipeline

use coderun_sandbox::{content_to_text, extract, CodeBlock, ExecutionRequest, UNKNOWN_LANGUAGE};
use coderun_tests::{require, sh_available, test_service};
use serde_json::json;

const ANSWER: &str = "Here you go:\n\n```python\nprint('Hello')\n```\n\nAnd in the shell:\n\n```sh\necho Hello\n```\n";

#[test]
fn test_blocks_in_order() {
    let blocks = extract(Some(ANSWER), false);
    assert_eq!(
        blocks,
        vec![
            CodeBlock::new("python", "print('Hello')"),
            CodeBlock::new("sh", "echo Hello"),
        ]
    );
}

#[test]
fn test_extraction_idempotent() {
    for text in [ANSWER, "use `ls`", "plain text", ""] {
        for inline in [true, false] {
            assert_eq!(extract(Some(text), inline), extract(Some(text), inline));
        }
    }
}

#[test]
fn test_structured_content() {
    let content = json!([
        {"type": "text", "text": "Look at this chart"},
        {"type": "image_url", "image_url": {"url": "https://example.com/chart.png"}},
        {"type": "text", "text": "then run `date`"}
    ]);
    let text = content_to_text(&content);
    assert!(text.contains("[image]"));

    let blocks = extract(Some(&text), true);
    assert_eq!(blocks, vec![CodeBlock::new(UNKNOWN_LANGUAGE, "date")]);
}

#[tokio::test]
async fn test_extracted_shell_block_runs() {
    require!(sh_available(), "sh");
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path());

    let block = extract(Some(ANSWER), false)
        .into_iter()
        .find(|b| b.language == "sh")
        .unwrap();
    let result = service
        .execute(ExecutionRequest::new(block.language, block.code))
        .await
        .unwrap();
    assert_eq!(result.logs(), "Hello");
}
