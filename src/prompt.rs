//! Operator prompts on the terminal.

use async_trait::async_trait;
use inquire::{Confirm, InquireError, Password, PasswordDisplayMode, Text};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::{BullhornError, BullhornResult, ConfigurationError};

/// Question asked before a batch touches live records.
pub const CONTINUE_QUESTION: &str = "Do you want to continue?";

/// Whether an answer confirms. Only `y` does, case and surrounding
/// whitespace aside.
pub fn is_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

fn prompt_error(message: impl ToString) -> BullhornError {
    BullhornError::Configuration(ConfigurationError::InvalidValue {
        field: "prompt".to_string(),
        message: message.to_string(),
    })
}

/// Run a blocking terminal prompt off the async runtime.
async fn blocking<T, F>(prompt: F) -> BullhornResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InquireError> + Send + 'static,
{
    tokio::task::spawn_blocking(prompt)
        .await
        .map_err(prompt_error)?
        .map_err(prompt_error)
}

/// Ask the operator to confirm a batch. Escape and Ctrl+C decline.
pub async fn confirm_to_continue(question: &str) -> BullhornResult<bool> {
    let question = question.to_string();
    blocking(move || {
        let answer = Confirm::new(&question)
            .with_default(false)
            .with_parser(&|answer| Ok(is_confirmation(answer)))
            .prompt();
        match answer {
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            other => other,
        }
    })
    .await
}

/// Ask for a single value, trimmed.
pub async fn prompt_value(label: &str) -> BullhornResult<String> {
    let label = label.to_string();
    let value = blocking(move || Text::new(&label).prompt()).await?;
    Ok(value.trim().to_string())
}

/// Ask for a secret without echoing it.
pub async fn prompt_secret(label: &str) -> BullhornResult<String> {
    let label = label.to_string();
    let value = blocking(move || {
        Password::new(&label)
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
    })
    .await?;
    Ok(value.trim().to_string())
}

/// Source of operator answers.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask a y/n question.
    async fn confirm(&self, question: &str) -> BullhornResult<bool>;

    /// Ask for one value.
    async fn value(&self, label: &str) -> BullhornResult<String>;

    /// Ask for one value with masked input.
    async fn secret(&self, label: &str) -> BullhornResult<String>;
}

/// Prompts on the controlling terminal.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&self, question: &str) -> BullhornResult<bool> {
        confirm_to_continue(question).await
    }

    async fn value(&self, label: &str) -> BullhornResult<String> {
        prompt_value(label).await
    }

    async fn secret(&self, label: &str) -> BullhornResult<String> {
        prompt_secret(label).await
    }
}

/// Scripted answers for testing. Questions asked are recorded.
#[derive(Default)]
pub struct MockPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
    masked: Mutex<Vec<String>>,
}

impl MockPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next answer.
    pub fn answer(&self, answer: impl Into<String>) -> &Self {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer.into());
        self
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Labels asked with masked input.
    pub fn masked(&self) -> Vec<String> {
        self.masked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next(&self, question: &str) -> String {
        self.asked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(question.to_string());
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Prompter for MockPrompter {
    async fn confirm(&self, question: &str) -> BullhornResult<bool> {
        Ok(is_confirmation(&self.next(question)))
    }

    async fn value(&self, label: &str) -> BullhornResult<String> {
        Ok(self.next(label).trim().to_string())
    }

    async fn secret(&self, label: &str) -> BullhornResult<String> {
        self.masked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label.to_string());
        Ok(self.next(label).trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_answers() {
        assert!(is_confirmation("y"));
        assert!(is_confirmation(" Y \n"));
        assert!(!is_confirmation("yes"));
        assert!(!is_confirmation("n"));
        assert!(!is_confirmation(""));
    }

    #[test]
    fn test_prompt_error_is_configuration_error() {
        let error = prompt_error(InquireError::NotTTY);
        assert_eq!(error.error_code(), "BH_CONFIG");
        assert!(!error.is_transient());
    }

    #[tokio::test]
    async fn test_mock_prompter_declines_when_out_of_answers() {
        let prompter = MockPrompter::new();
        prompter.answer("y");

        assert!(prompter.confirm(CONTINUE_QUESTION).await.unwrap());
        assert!(!prompter.confirm(CONTINUE_QUESTION).await.unwrap());
        assert_eq!(prompter.asked().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_prompter_records_masked_prompts() {
        let prompter = MockPrompter::new();
        prompter.answer(" user ").answer(" pw ");

        assert_eq!(prompter.value("API username").await.unwrap(), "user");
        assert_eq!(prompter.secret("API password").await.unwrap(), "pw");
        assert_eq!(prompter.asked(), vec!["API username", "API password"]);
        assert_eq!(prompter.masked(), vec!["API password"]);
    }
}
