use crate::agent::backend::AgentTask;

pub const DEFAULT_VIDEO_URL: &str = "https://www.youtube.com/watch?v=2E140N7NfG4";

impl AgentTask {
    /// Build the transcript-extraction plan for `video_url`.
    /// `extra` is appended verbatim when non-empty.
    pub fn for_video(video_url: &str, extra: &str) -> Self {
        let mut instructions = format!(
            "Open {video_url} and extract the video's transcript.\n\n\
             Plan:\n\
             1. If a cookie consent dialog appears, click \"Accept all\".\n\
             2. Click \"Show more\" in the video description.\n\
             3. Click the \"Show transcript\" button.\n\
             4. Read every transcript segment in the panel, in order, collecting its \
                timestamp and its text.\n\
             5. Finish with the collected data as JSON exactly like: \
                {{\"transcriptions\": [{{\"timestamp\": \"...\", \"transcribed_text\": \"...\"}}]}}\n\n\
             Choose one concrete action per step."
        );

        let extra = extra.trim();
        if !extra.is_empty() {
            instructions.push_str("\n\n");
            instructions.push_str(extra);
        }

        Self {
            start_url: video_url.to_string(),
            instructions,
        }
    }
}
