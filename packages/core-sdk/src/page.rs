/**
 * \brief Chat page served at `/`, self-contained (inline style and script).
 */
pub const INDEX_HTML: &str = include_str!("../assets/index.html");
