//! Error types for the submission pipeline.

use snafu::Snafu;

/// Errors raised while loading keys, connecting to a node, or submitting
/// transactions.
///
/// Note that a failed extrinsic execution is not an error here: the queue
/// represents it as entry data and the UI layer surfaces it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Error when reading a signing key from a file.
    #[snafu(display("Failed to read key from file '{}': {}", path, source))]
    KeyFileRead {
        /// The path of the key file that could not be read.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Error when parsing a signing key from a hexadecimal string.
    #[snafu(display("Failed to parse key as hex: {}", source))]
    KeyParse {
        /// The underlying hex parsing error.
        source: hex::FromHexError,
    },

    /// Error when the parsed key length is invalid.
    ///
    /// sr25519 secret keys must be exactly 32 bytes long.
    #[snafu(display("Invalid key length: expected 32 bytes, got {}", length))]
    InvalidKeyLength {
        /// The actual length of the provided key.
        length: usize,
    },

    /// Error when creating a keypair from a secret key.
    #[snafu(display("Failed to create keypair from secret key"))]
    KeypairCreation,

    /// Error when connecting to a blockchain node.
    #[snafu(display("Error connecting to chain: {source}"))]
    ChainConnection {
        /// The underlying error from the `subxt` library.
        source: subxt::Error,
    },

    /// Error when submitting or watching a transaction.
    #[snafu(display("Error submitting tx: {source}"))]
    Submission {
        /// The underlying error from the `subxt` library.
        source: subxt::Error,
    },

    /// Error when fetching the events of an included extrinsic.
    #[snafu(display("Error fetching extrinsic events: {source}"))]
    FetchEvents {
        /// The underlying error from the `subxt` library.
        source: subxt::Error,
    },
}

/// Type alias for results using the pipeline [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
