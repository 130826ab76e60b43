use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of a command failed. Details live in the error's children.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up source")]
    Source,
    #[display("crawl failed")]
    Crawl,
    #[display("staging operation failed")]
    Staging,
    #[display("could not talk to the terminal")]
    Terminal,
}
