pub const AGENT_SYSTEM_PROMPT: &str = "You are an agent that solves data-related quiz tasks published on web pages.

## HOW TO WORK
- Read the page content you are given. It ends with a list of extracted links, audio, images and, when the page has visuals, a local screenshot path.
- Use tools instead of guessing. Call them immediately; do not narrate plans.
- Media, in this order of preference:
  - Audio: transcribe_audio(url)
  - Images and screenshots: understand_image(url, prompt). Paths under /tmp are local files; pass them as-is.
  - PDF / ZIP: read_pdf(url) / read_zip(url)
  - Other files (CSV, JSON, text): download_file(url) or run_python_code
- Earlier pages: search_history(query) with the previous quiz URL.
- call_api(url) only when the page explicitly tells you to call an API.
- fetch_page_scripts(url) only when the page explicitly asks you to run or read its JavaScript.
- fetch_page_text(url) to read another page the task links to.
- If the content looks unchanged or ambiguous, check the screenshot with understand_image first.

## DATA ANALYSIS
- Inspect before analysing: load the file and print its head and columns, then write the analysis in a second step.
- Check HTTP status codes when downloading inside code. Save scratch files under /tmp.
- Lists of bare numbers in CSV have no header row.
- Compute the answer in code and print only the result.

## ANSWERS
- Return secret codes exactly as requested, without extra whitespace.
- If an earlier submission in this conversation was wrong, consider submitting the same value in another type (integer, float, string).
- Your final message must be a single JSON object and nothing else:
{
  \"answer_payload\": {\"email\": \"...\", \"secret\": \"...\", \"url\": \"...\", \"answer\": ...},
  \"submit_url\": \"...\",
  \"reasoning\": \"...\"
}
- If you would rather have the solver run a script for you, reply with {\"python_code\": \"...\"} instead and you will receive its output.";

pub const INVALID_JSON_PROMPT: &str = "Error: Your response was not valid JSON. Please return ONLY a JSON object. Do not include any conversational text.";

pub const MISSING_FIELDS_PROMPT: &str = "Error: You must return a JSON object with 'answer_payload' and 'submit_url'. Do not return conversational text.";

/// Everything the task prompt is built from.
#[derive(Debug, Clone)]
pub struct TaskPromptInput<'a> {
    pub page_url: &'a str,
    pub content: &'a str,
    pub email: &'a str,
    pub secret: &'a str,
    pub default_submit_url: Option<&'a str>,
    /// Set when the same URL was loaded before and the content did not change.
    pub content_unchanged: bool,
    pub previous_reason: Option<&'a str>,
}

pub fn task_prompt(input: &TaskPromptInput<'_>) -> String {
    let mut prompt = format!(
        "Current Page URL: {url}\n\nPage Content:\n---\n{content}\n---\n\n\
GOAL: solve the task on the current page.\n\n\
Credentials for the answer payload:\n- email: {email}\n- secret: {secret}\n- url: {url}\n\
Only use the email or secret as the answer if the page explicitly asks for them.\n\
Resolve relative URLs against the Current Page URL.\n",
        url = input.page_url,
        content = input.content,
        email = input.email,
        secret = input.secret,
    );

    match input.default_submit_url {
        Some(submit) => prompt.push_str(&format!(
            "If the page does not name a submission URL, submit to {}.\n",
            submit
        )),
        None => prompt.push_str("Take the submission URL from the page.\n"),
    }

    if input.content_unchanged {
        prompt.push_str(
            "\nNOTE: this page was already attempted and its content has not changed. \
Verify it visually with understand_image on the screenshot before answering again.\n",
        );
    }
    if let Some(reason) = input.previous_reason {
        prompt.push_str(&format!(
            "\nThe previous answer for this page was rejected: {}\n",
            reason
        ));
    }

    prompt.push_str("\nReply with the final JSON object once you have the answer.");
    prompt
}

pub fn code_followup_prompt(output: &str, email: &str, secret: &str, page_url: &str) -> String {
    format!(
        "The Python code executed. Output:\n\n{output}\n\n\
Now return the final JSON for submission:\n\n\
{{\n    \"answer_payload\": {{\"email\": \"{email}\", \"secret\": \"{secret}\", \"url\": \"{page_url}\", \"answer\": <extract from output above>}},\n    \
\"submit_url\": <submit URL from original page>,\n    \"reasoning\": <brief explanation>\n}}",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>() -> TaskPromptInput<'a> {
        TaskPromptInput {
            page_url: "https://quiz.example.com/q1",
            content: "Sum the {values} column",
            email: "student@example.com",
            secret: "s3cret",
            default_submit_url: None,
            content_unchanged: false,
            previous_reason: None,
        }
    }

    #[test]
    fn task_prompt_embeds_page_and_credentials() {
        let prompt = task_prompt(&input());

        assert!(prompt.contains("Current Page URL: https://quiz.example.com/q1"));
        assert!(prompt.contains("Sum the {values} column"));
        assert!(prompt.contains("- email: student@example.com"));
        assert!(prompt.contains("- secret: s3cret"));
        assert!(prompt.contains("Take the submission URL from the page."));
        assert!(!prompt.contains("NOTE:"));
    }

    #[test]
    fn task_prompt_mentions_default_submit_and_retry_context() {
        let mut input = input();
        input.default_submit_url = Some("https://quiz.example.com/submit");
        input.content_unchanged = true;
        input.previous_reason = Some("Expected a number");

        let prompt = task_prompt(&input);

        assert!(prompt.contains("submit to https://quiz.example.com/submit"));
        assert!(prompt.contains("content has not changed"));
        assert!(prompt.contains("rejected: Expected a number"));
    }

    #[test]
    fn followup_prompt_carries_output_and_credentials() {
        let prompt = code_followup_prompt("{'total': 10}", "a@example.com", "s", "https://q/1");

        assert!(prompt.contains("Output:\n\n{'total': 10}"));
        assert!(prompt.contains(r#""email": "a@example.com""#));
        assert!(prompt.contains(r#""url": "https://q/1""#));
        assert!(prompt.contains("\"submit_url\""));
    }
}
