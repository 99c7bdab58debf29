//! Handler error messages carried on the response.
//!
//! Handlers (or their error types' `IntoResponse`) attach messages here; the
//! request logging middleware reads them back into the `Error Messages` line.

use std::fmt;

use axum::response::Response;

/// Error messages recorded by the handler chain for one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerErrors(Vec<String>);

impl HandlerErrors {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Append a message to the response's error list, creating it if needed.
    pub fn attach(response: &mut Response, message: impl Into<String>) {
        let extensions = response.extensions_mut();
        match extensions.get_mut::<HandlerErrors>() {
            Some(errors) => errors.push(message),
            None => {
                let mut errors = HandlerErrors::default();
                errors.push(message);
                extensions.insert(errors);
            }
        }
    }
}

impl fmt::Display for HandlerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, message) in self.0.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn numbers_each_message() {
        let mut errors = HandlerErrors::default();
        errors.push("db unavailable");
        errors.push("retry exhausted");

        assert_eq!(
            errors.to_string(),
            "Error #01: db unavailable\nError #02: retry exhausted\n"
        );
    }

    #[test]
    fn attach_accumulates() {
        let mut response = Response::new(Body::empty());
        HandlerErrors::attach(&mut response, "first");
        HandlerErrors::attach(&mut response, "second");

        let errors = response.extensions().get::<HandlerErrors>().unwrap();
        assert_eq!(errors.messages(), ["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn empty_renders_nothing() {
        assert!(HandlerErrors::default().messages().is_empty());
        assert_eq!(HandlerErrors::default().to_string(), "");
    }
}
