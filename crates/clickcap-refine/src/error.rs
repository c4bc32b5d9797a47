/// An error type for the refiner module.
#[derive(thiserror::Error, Debug)]
pub enum RefineError {
    /// Error from the HTTP client.
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),

    /// Error when the API returns a non-success status.
    #[error("API request failed with status {status}: {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The response body, if any.
        message: String,
    },

    /// Error when the API returns no choices.
    #[error("API response contains no choices")]
    EmptyResponse,
}
