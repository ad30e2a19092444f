use std::{error::Error, fmt};

#[derive(Debug)]
pub enum EscrowError {
    Simple(String),
    /// Trade identifier unknown to the backend. Routes the user back to a
    /// neutral entry state, never fatal.
    NotFound(String),
    /// Malformed user input, or the backend rejected a request body.
    Validation(String),
    /// Fetch or subscribe could not reach the backend.
    NetworkUnavailable(String),
    /// No wallet account, wrong network, or the user refused a network switch.
    ChainUnavailable(String),
    /// The wallet reported a chain id it does not know. Internal to the
    /// switch-then-register flow in `chain::ensure_network`.
    UnrecognizedChain(String),
    /// A submitted chain call reverted or was rejected at signing.
    ChainCall(String),
    /// A status value outside the known lifecycle set.
    UnknownStatus(String),
    StrumParsing(strum::ParseError),
    SerdesJson(serde_json::Error),
    Reqwest(reqwest::Error),
    WebSocket(tokio_tungstenite::tungstenite::Error),
    Io(std::io::Error),
    MpscSend(String),
    OneshotRecv(tokio::sync::oneshot::error::RecvError),
}

impl Error for EscrowError {}

impl fmt::Display for EscrowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let error_string = match self {
            EscrowError::Simple(msg) => format!("Escrow-Error | Other - {}", msg),
            EscrowError::NotFound(id) => {
                format!("Escrow-Error | NotFound - Trade {} unknown to backend", id)
            }
            EscrowError::Validation(msg) => format!("Escrow-Error | Validation - {}", msg),
            EscrowError::NetworkUnavailable(msg) => {
                format!("Escrow-Error | NetworkUnavailable - {}", msg)
            }
            EscrowError::ChainUnavailable(msg) => {
                format!("Escrow-Error | ChainUnavailable - {}", msg)
            }
            EscrowError::UnrecognizedChain(chain_id) => {
                format!(
                    "Escrow-Error | UnrecognizedChain - Wallet does not know chain {}",
                    chain_id
                )
            }
            EscrowError::ChainCall(msg) => format!("Escrow-Error | ChainCall - {}", msg),
            EscrowError::UnknownStatus(status) => {
                format!("Escrow-Error | UnknownStatus - {}", status)
            }
            EscrowError::StrumParsing(err) => {
                format!("Escrow-Error | StrumParseError - {}", err)
            }
            EscrowError::SerdesJson(err) => {
                format!("Escrow-Error | SerdesJsonError - {}", err)
            }
            EscrowError::Reqwest(err) => format!("Escrow-Error | ReqwestError - {}", err),
            EscrowError::WebSocket(err) => format!("Escrow-Error | WebSocketError - {}", err),
            EscrowError::Io(err) => format!("Escrow-Error | IoError - {}", err),
            EscrowError::MpscSend(msg) => format!("Escrow-Error | MpscSendError - {}", msg),
            EscrowError::OneshotRecv(err) => {
                format!("Escrow-Error | OneshotRecvError - {}", err)
            }
        };
        write!(f, "{}", error_string)
    }
}

impl From<strum::ParseError> for EscrowError {
    fn from(e: strum::ParseError) -> EscrowError {
        EscrowError::StrumParsing(e)
    }
}

impl From<serde_json::Error> for EscrowError {
    fn from(e: serde_json::Error) -> EscrowError {
        EscrowError::SerdesJson(e)
    }
}

impl From<reqwest::Error> for EscrowError {
    fn from(e: reqwest::Error) -> EscrowError {
        EscrowError::Reqwest(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EscrowError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> EscrowError {
        EscrowError::WebSocket(e)
    }
}

impl From<std::io::Error> for EscrowError {
    fn from(e: std::io::Error) -> EscrowError {
        EscrowError::Io(e)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for EscrowError {
    fn from(e: tokio::sync::mpsc::error::SendError<T>) -> EscrowError {
        EscrowError::MpscSend(e.to_string())
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for EscrowError {
    fn from(e: tokio::sync::oneshot::error::RecvError) -> EscrowError {
        EscrowError::OneshotRecv(e)
    }
}
