use serde::{Deserialize, Serialize};

/** \brief Store-assigned row identifier. */
pub type RecordId = i64;

/**
 * \brief One persisted user-message/AI-response pair.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRecord {
    /** \brief Autoincrement primary key */
    pub id: RecordId,
    /** \brief Verbatim client input; absent when the request carried no `message` */
    pub user_message: Option<String>,
    /** \brief Model reply or an `Error: ...` string */
    pub ai_response: String,
}

/**
 * \brief Body of `POST /chat`.
 */
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub reply: String,
}
