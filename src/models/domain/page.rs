use sha2::{Digest, Sha256};

pub const MEDIA_SECTION_HEADER: &str = "--- Extracted Links & Media ---";

/// What the agent gets to see of a quiz page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub text: String,
    pub base_url: String,
    pub links: Vec<String>,
    pub audio: Vec<String>,
    pub images: Vec<String>,
    pub screenshot: Option<String>,
}

impl PageContent {
    pub fn attach_screenshot(&mut self, path: impl Into<String>) {
        self.screenshot = Some(path.into());
    }

    pub fn media_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.links.len() + self.audio.len() + self.images.len() + 1);
        lines.extend(self.links.iter().cloned());
        lines.extend(self.audio.iter().cloned());
        lines.extend(self.images.iter().cloned());
        if let Some(path) = &self.screenshot {
            lines.push(format!("Image: [Page Screenshot]({})", path));
        }
        lines
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n\n{}\n{}",
            self.text,
            MEDIA_SECTION_HEADER,
            self.media_lines().join("\n")
        )
    }

    /// SHA-256 of the text and media references, ignoring the screenshot path
    /// since it changes with every session.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        for line in self.links.iter().chain(&self.audio).chain(&self.images) {
            hasher.update(b"\n");
            hasher.update(line.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn excerpt(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}
