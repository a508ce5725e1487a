use quiz_solver::{
    models::{
        domain::{AgentAnswer, SubmissionOutcome},
        dto::request::QuizRequestDto,
    },
    services::{
        extraction::{extract_page, extract_scripts, resolve_url},
        response_parser::{parse_directive, AgentDirective, ParseError},
        tools::{truncate_output, LocalRoots, Source},
    },
};
use serde_json::json;
use validator::Validate;

const PAGE_URL: &str = "https://quiz.example.com/demo/q2";

#[test]
fn test_request_dto_accepts_extra_fields_and_validates_url() {
    let dto: QuizRequestDto = serde_json::from_value(json!({
        "email": "student@example.com",
        "secret": "s3cret",
        "url": PAGE_URL,
        "source": "grader"
    }))
    .unwrap();
    assert!(dto.validate().is_ok());

    let bad: QuizRequestDto = serde_json::from_value(json!({
        "email": "student@example.com",
        "secret": "s3cret",
        "url": "ftp://quiz.example.com/q"
    }))
    .unwrap();
    assert!(bad.validate().is_err());
}

#[test]
fn test_page_extraction_honours_base_tag() {
    let html = r#"<html><head><base href="https://cdn.example.com/assets/"></head>
<body>
  <p>Listen and transcribe.</p>
  <audio><source src="clip.opus" type="audio/ogg"></audio>
  <a href="data/table.csv">table</a>
  <img src="">
</body></html>"#;

    let page = extract_page(html, PAGE_URL);

    assert_eq!(page.base_url, "https://cdn.example.com/assets/");
    assert_eq!(page.audio, vec!["Audio: https://cdn.example.com/assets/clip.opus"]);
    assert_eq!(page.links, vec!["Link: [table](https://cdn.example.com/assets/data/table.csv)"]);
    assert!(page.images.is_empty());
    assert!(page.render().contains("--- Extracted Links & Media ---"));
}

#[test]
fn test_scripts_split_inline_and_external() {
    let html = r#"<html><head>
<script src="/static/app.js"></script>
<script>document.write(atob("c2VjcmV0"));</script>
</head><body></body></html>"#;

    let scripts = extract_scripts(html, PAGE_URL);

    assert_eq!(scripts.external, vec!["https://quiz.example.com/static/app.js"]);
    assert_eq!(scripts.inline.len(), 1);
    assert!(scripts.inline[0].contains("atob"));
}

#[test]
fn test_agent_reply_to_submission_payload() {
    let reply = "```json\n{\"answer_payload\": {\"answer\": \"ABC123\", \"email\": \"\"}, \"submit_url\": \"../submit\"}\n```";

    let AgentDirective::Submit(mut answer) = parse_directive(reply).unwrap() else {
        panic!("expected a submission");
    };
    answer.fill_credentials("student@example.com", "s3cret", PAGE_URL);

    assert_eq!(
        answer,
        AgentAnswer {
            answer_payload: json!({
                "answer": "ABC123",
                "email": "student@example.com",
                "secret": "s3cret",
                "url": PAGE_URL
            }),
            submit_url: "../submit".to_string(),
            reasoning: None,
        }
    );
    assert_eq!(
        resolve_url(PAGE_URL, &answer.submit_url),
        "https://quiz.example.com/submit"
    );
}

#[test]
fn test_parse_failures_are_classified() {
    assert!(matches!(
        parse_directive("Downloading the file now."),
        Err(ParseError::InvalidJson(_))
    ));
    assert_eq!(
        parse_directive(r#"{"submit_url": "https://quiz.example.com/submit"}"#),
        Err(ParseError::MissingFields)
    );
}

#[test]
fn test_submission_outcome_from_server_reply() {
    let outcome: SubmissionOutcome = serde_json::from_value(json!({
        "correct": true,
        "url": "https://quiz.example.com/demo/q3",
        "delay": 12
    }))
    .unwrap();

    assert!(outcome.correct);
    assert_eq!(outcome.url.as_deref(), Some("https://quiz.example.com/demo/q3"));
    assert_eq!(outcome.extra.get("delay"), Some(&json!(12)));
}

#[tokio::test]
async fn test_local_sources_are_read_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("numbers.csv");
    std::fs::write(&path, "1\n2\n3\n").unwrap();

    let roots = LocalRoots::new([dir.path()]);
    let source = Source::classify(path.to_str().unwrap(), &roots).unwrap();
    assert_eq!(source.file_name().as_deref(), Some("numbers.csv"));

    let (bytes, _) = source.fetch(&reqwest::Client::new()).await.unwrap();
    assert_eq!(truncate_output(String::from_utf8(bytes).unwrap(), 4), "1\n2\n\n...[truncated 2 characters]");
}
