//! Tool implementations for the echohealth MCP server
//!
//! Each tool is a plain function over the retrieval engine or the grounding
//! compositor; the server only adapts them to MCP. Failures are returned as
//! `Err(String)` so the client sees a tool error rather than an empty result.

pub mod doc_search;
pub mod grounded_answer;

#[cfg(test)]
pub(crate) mod test_support;
