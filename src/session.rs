use std::{future::Future, time::Duration};

use serde::Deserialize;
use strum::Display;
use thiserror::Error;

use crate::{i18n::LanguageCode, images::ImageSource};

/// How the student presented their solution attempt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SolutionAttempt {
    Text {
        text: String,
    },
    Image {
        #[serde(default)]
        image: Option<ImageSource>,
    },
    /// A recorded video, optionally with a summary produced upstream.
    Video {
        #[serde(default)]
        summary: Option<String>,
    },
    Audio,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    Text { text: String },
    Audio,
}

/// Everything the student submitted before the tutoring chat began.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub problem_image: Option<ImageSource>,
    pub solution: SolutionAttempt,
    pub question: Question,
    #[serde(default)]
    pub language: LanguageCode,
}

impl ReportRequest {
    /// Checks the inputs a session needs before analysis can start.
    pub fn validate(&self) -> Result<(), Error> {
        if self.problem_image.is_none() {
            return Err(Error::MissingProblemImage);
        }
        if let SolutionAttempt::Text { text } = &self.solution {
            if text.trim().is_empty() {
                return Err(Error::EmptySolution);
            }
        }
        if let Question::Text { text } = &self.question {
            if text.trim().is_empty() {
                return Err(Error::EmptyQuestion);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(alias = "user")]
    Student,
    #[serde(alias = "model")]
    Tutor,
}

/// One turn of the tutoring chat.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub image: Option<ImageSource>,
    /// Transient "the tutor is typing" marker, never part of a report.
    #[serde(default, alias = "isThinking")]
    pub thinking: bool,
}

impl TranscriptEntry {
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            role: Role::Student,
            text: text.into(),
            image: None,
            thinking: false,
        }
    }

    pub fn tutor(text: impl Into<String>) -> Self {
        Self {
            role: Role::Tutor,
            ..Self::student(text)
        }
    }

    pub fn thinking(text: impl Into<String>) -> Self {
        Self {
            thinking: true,
            ..Self::tutor(text)
        }
    }

    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Input,
    Analyzing,
    Interacting,
    SatisfactionCheck,
    Saving,
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("cannot {action} while in stage {stage}")]
    Stage { stage: Stage, action: &'static str },
    #[error("a problem image is required")]
    MissingProblemImage,
    #[error("the solution attempt is empty")]
    EmptySolution,
    #[error("the question is empty")]
    EmptyQuestion,
    #[error("a message needs text or an image")]
    EmptyMessage,
}

/// How the save step ended. Every outcome completes the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed(String),
    TimedOut,
}

/// Drives one tutoring session from input to completion.
#[derive(Debug)]
pub struct Session {
    stage: Stage,
    request: Option<ReportRequest>,
    transcript: Vec<TranscriptEntry>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            stage: Stage::Input,
            request: None,
            transcript: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn request(&self) -> Option<&ReportRequest> {
        self.request.as_ref()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    fn expect_stage(&self, stage: Stage, action: &'static str) -> Result<(), Error> {
        if self.stage != stage {
            return Err(Error::Stage {
                stage: self.stage,
                action,
            });
        }
        Ok(())
    }

    fn drop_thinking(&mut self) {
        self.transcript.retain(|entry| !entry.thinking);
    }

    /// Validates the inputs and starts analysis, showing `placeholder` as a
    /// thinking entry until the diagnosis arrives.
    pub fn submit(&mut self, request: ReportRequest, placeholder: &str) -> Result<(), Error> {
        self.expect_stage(Stage::Input, "submit")?;
        request.validate()?;

        self.request = Some(request);
        self.transcript = vec![TranscriptEntry::thinking(placeholder)];
        self.stage = Stage::Analyzing;
        Ok(())
    }

    pub fn analysis_succeeded(&mut self, diagnosis: impl Into<String>) -> Result<(), Error> {
        self.expect_stage(Stage::Analyzing, "finish analysis")?;
        self.drop_thinking();
        self.transcript.push(TranscriptEntry::tutor(diagnosis));
        self.stage = Stage::Interacting;
        Ok(())
    }

    /// Returns to input so the student can resubmit; `notice` stays visible.
    pub fn analysis_failed(&mut self, notice: impl Into<String>) -> Result<(), Error> {
        self.expect_stage(Stage::Analyzing, "fail analysis")?;
        self.drop_thinking();
        self.transcript.push(TranscriptEntry::tutor(notice));
        self.stage = Stage::Input;
        Ok(())
    }

    /// Appends a student message followed by a thinking entry.
    pub fn send(
        &mut self,
        text: impl Into<String>,
        image: Option<ImageSource>,
        placeholder: &str,
    ) -> Result<(), Error> {
        self.expect_stage(Stage::Interacting, "send a message")?;
        let text = text.into();
        if text.trim().is_empty() && image.is_none() {
            return Err(Error::EmptyMessage);
        }

        self.transcript.push(TranscriptEntry {
            image,
            ..TranscriptEntry::student(text)
        });
        self.transcript.push(TranscriptEntry::thinking(placeholder));
        Ok(())
    }

    /// Replaces the thinking entry with the tutor's reply, or with an error
    /// notice when the reply never came.
    pub fn receive(&mut self, reply: impl Into<String>) -> Result<(), Error> {
        self.expect_stage(Stage::Interacting, "receive a reply")?;
        self.drop_thinking();
        self.transcript.push(TranscriptEntry::tutor(reply));
        Ok(())
    }

    pub fn request_finish(&mut self) -> Result<(), Error> {
        self.expect_stage(Stage::Interacting, "finish")?;
        self.stage = Stage::SatisfactionCheck;
        Ok(())
    }

    pub fn satisfaction(&mut self, satisfied: bool) -> Result<(), Error> {
        self.expect_stage(Stage::SatisfactionCheck, "answer the satisfaction check")?;
        self.stage = if satisfied {
            Stage::Saving
        } else {
            Stage::Interacting
        };
        Ok(())
    }

    /// Runs the save step, bounded by `timeout`. Whatever happens the session
    /// ends up completed; failures are only logged.
    pub async fn save<F, E>(&mut self, save: F, timeout: Duration) -> Result<SaveOutcome, Error>
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        self.expect_stage(Stage::Saving, "save")?;

        let outcome = match tokio::time::timeout(timeout, save).await {
            Ok(Ok(())) => {
                tracing::info!("Session saved");
                SaveOutcome::Saved
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to save session, continuing: {}", e);
                SaveOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::warn!("Saving the session timed out after {:?}, continuing", timeout);
                SaveOutcome::TimedOut
            }
        };
        self.stage = Stage::Completed;
        Ok(outcome)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The transcript as it belongs in a report: thinking entries removed.
    pub fn report_transcript(&self) -> Vec<TranscriptEntry> {
        self.transcript
            .iter()
            .filter(|entry| !entry.thinking)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReportRequest {
        ReportRequest {
            problem_image: Some(ImageSource::Url("https://example.com/p.png".to_string())),
            solution: SolutionAttempt::Text {
                text: "x = 2".to_string(),
            },
            question: Question::Text {
                text: "Why?".to_string(),
            },
            language: LanguageCode::En,
        }
    }

    fn interacting() -> Session {
        let mut session = Session::new();
        session.submit(request(), "Analyzing...").unwrap();
        session.analysis_succeeded("Let's look at step 1.").unwrap();
        session
    }

    #[test]
    fn test_validation() {
        let mut no_image = request();
        no_image.problem_image = None;
        assert_eq!(no_image.validate(), Err(Error::MissingProblemImage));

        let mut blank_solution = request();
        blank_solution.solution = SolutionAttempt::Text {
            text: "  ".to_string(),
        };
        assert_eq!(blank_solution.validate(), Err(Error::EmptySolution));

        let mut blank_question = request();
        blank_question.question = Question::Text {
            text: String::new(),
        };
        assert_eq!(blank_question.validate(), Err(Error::EmptyQuestion));

        let mut audio = request();
        audio.solution = SolutionAttempt::Audio;
        audio.question = Question::Audio;
        assert_eq!(audio.validate(), Ok(()));
    }

    #[test]
    fn test_submit_rejects_invalid_input_and_stays_in_input() {
        let mut session = Session::new();
        let mut invalid = request();
        invalid.problem_image = None;
        assert!(session.submit(invalid, "...").is_err());
        assert_eq!(session.stage(), Stage::Input);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_thinking_entries_are_replaced() {
        let mut session = interacting();
        assert_eq!(session.transcript().len(), 1);

        session.send("What about step 2?", None, "Thinking...").unwrap();
        assert!(session.transcript().last().unwrap().thinking);
        assert_eq!(session.report_transcript().len(), 2);

        session.receive("Try isolating x.").unwrap();
        let roles = session
            .transcript()
            .iter()
            .map(|entry| (entry.role, entry.thinking))
            .collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![
                (Role::Tutor, false),
                (Role::Student, false),
                (Role::Tutor, false)
            ]
        );
    }

    #[test]
    fn test_empty_message_rejected() {
        let mut session = interacting();
        assert_eq!(session.send(" ", None, "..."), Err(Error::EmptyMessage));
        let image = ImageSource::Bytes(vec![1, 2, 3]);
        assert!(session.send("", Some(image), "...").is_ok());
    }

    #[test]
    fn test_failed_analysis_returns_to_input() {
        let mut session = Session::new();
        session.submit(request(), "Analyzing...").unwrap();
        session.analysis_failed("Something went wrong.").unwrap();

        assert_eq!(session.stage(), Stage::Input);
        assert_eq!(session.transcript(), &[TranscriptEntry::tutor("Something went wrong.")]);
    }

    #[test]
    fn test_unsatisfied_continues_interacting() {
        let mut session = interacting();
        session.request_finish().unwrap();
        assert_eq!(session.stage(), Stage::SatisfactionCheck);
        session.satisfaction(false).unwrap();
        assert_eq!(session.stage(), Stage::Interacting);
    }

    #[test]
    fn test_illegal_transition() {
        let mut session = Session::new();
        assert_eq!(
            session.request_finish(),
            Err(Error::Stage {
                stage: Stage::Input,
                action: "finish"
            })
        );
    }

    fn reach_saving() -> Session {
        let mut session = interacting();
        session.request_finish().unwrap();
        session.satisfaction(true).unwrap();
        session
    }

    #[tokio::test]
    async fn test_save_outcomes_all_complete() {
        let mut session = reach_saving();
        let outcome = session
            .save(async { Ok::<_, String>(()) }, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(session.stage(), Stage::Completed);

        let mut session = reach_saving();
        let outcome = session
            .save(async { Err("offline") }, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Failed("offline".to_string()));
        assert_eq!(session.stage(), Stage::Completed);

        let mut session = reach_saving();
        let stalled = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(())
        };
        let outcome = session
            .save(stalled, Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::TimedOut);
        assert_eq!(session.stage(), Stage::Completed);
    }

    #[test]
    fn test_reset_from_any_stage() {
        let mut session = interacting();
        session.reset();
        assert_eq!(session.stage(), Stage::Input);
        assert!(session.request().is_none());
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_deserialize_request_and_entries() {
        let request: ReportRequest = serde_json::from_str(
            r#"{
                "problem_image": { "url": "https://example.com/p.png" },
                "solution": { "type": "video", "summary": "Draws a graph" },
                "question": { "type": "audio" },
                "language": "pt"
            }"#,
        )
        .unwrap();
        assert_eq!(
            request.solution,
            SolutionAttempt::Video {
                summary: Some("Draws a graph".to_string())
            }
        );
        assert_eq!(request.language, LanguageCode::Pt);

        let entry: TranscriptEntry =
            serde_json::from_str(r#"{ "role": "model", "text": "hi", "isThinking": true }"#).unwrap();
        assert_eq!(entry, TranscriptEntry::thinking("hi"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        let request: ReportRequest = serde_json::from_str(
            r#"{"solution":{"type":"audio"},"question":{"type":"audio"},"language":"xx"}"#,
        )
        .unwrap();
        assert_eq!(request.language, LanguageCode::En);

        let request: ReportRequest =
            serde_json::from_str(r#"{"solution":{"type":"audio"},"question":{"type":"audio"}}"#)
                .unwrap();
        assert_eq!(request.language, LanguageCode::En);
    }
}
