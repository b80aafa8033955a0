//! CAS 2.0/3.0 `serviceResponse` parsing.
//!
//! Servers disagree on how the response is spelled: most declare the `cas`
//! prefix (`<cas:serviceResponse xmlns:cas="...">`), some emit bare element
//! names, and JASIG-derived servers wrap the extra attributes in an
//! `<attributes>` block. Each spelling is a [`Dialect`]; dialects are tried in
//! order and a dialect that does not apply to the document says so with
//! [`Match::NotApplicable`], letting the next one try.
//!
//! Parsing never panics and never returns an error: anything the parser
//! cannot make sense of becomes a [`ValidationResult::Failure`].

use roxmltree::{Document, Node};

use super::attributes::{Attributes, MergePolicy};

const CAS_PREFIX: &str = "cas";
const SERVICE_RESPONSE: &str = "serviceResponse";
const AUTHENTICATION_SUCCESS: &str = "authenticationSuccess";
const AUTHENTICATION_FAILURE: &str = "authenticationFailure";
/// Wrapper element whose children are merged into the parent mapping.
const ATTRIBUTES_WRAPPER: &str = "attributes";
/// Proxy chains are not exposed.
const PROXIES: &str = "proxies";
const MAX_ATTRIBUTE_DEPTH: usize = 32;

/// Outcome of a ticket validation exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Success(Attributes),
    Failure(FailureReason),
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationResult::Success(_))
    }
}

/// Why a ticket was not confirmed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailureReason {
    #[error("validation response is not well-formed XML: {0}")]
    Malformed(String),

    #[error("validation response has no authentication success element")]
    NoSuccessElement,

    #[error("CAS server rejected the ticket ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("authentication success carried no attributes")]
    NoAttributes,

    #[error("user id attribute '{field}' is missing")]
    MissingUid { field: String },
}

/// Result of locating the outcome element with one dialect.
enum Match<'a, 'input> {
    Success(Node<'a, 'input>),
    Failure(Node<'a, 'input>),
    /// The dialect applies but the response holds neither outcome.
    Empty,
    NotApplicable,
}

#[derive(Debug, Clone, Copy)]
enum Dialect {
    /// `cas:`-prefixed elements bound to the namespace declared on the root.
    Prefixed,
    /// Bare element names, matched by local name.
    Unprefixed,
}

const DIALECTS: [Dialect; 2] = [Dialect::Prefixed, Dialect::Unprefixed];

impl Dialect {
    fn locate<'a, 'input>(self, root: Node<'a, 'input>) -> Match<'a, 'input> {
        match self {
            Dialect::Prefixed => {
                let Some(ns) = root.lookup_namespace_uri(Some(CAS_PREFIX)) else {
                    return Match::NotApplicable;
                };
                let is_cas = |node: &Node, name: &str| {
                    node.tag_name().name() == name && node.tag_name().namespace() == Some(ns)
                };
                if !is_cas(&root, SERVICE_RESPONSE) {
                    return Match::Empty;
                }
                find_outcome(root, |node, name| is_cas(node, name))
            }
            Dialect::Unprefixed => {
                if root.tag_name().name() != SERVICE_RESPONSE {
                    return Match::NotApplicable;
                }
                find_outcome(root, |node, name| node.tag_name().name() == name)
            }
        }
    }
}

fn find_outcome<'a, 'input>(
    root: Node<'a, 'input>,
    is: impl Fn(&Node<'a, 'input>, &str) -> bool,
) -> Match<'a, 'input> {
    let mut failure = None;
    for child in root.children().filter(Node::is_element) {
        if is(&child, AUTHENTICATION_SUCCESS) {
            return Match::Success(child);
        }
        if failure.is_none() && is(&child, AUTHENTICATION_FAILURE) {
            failure = Some(child);
        }
    }
    failure.map_or(Match::Empty, Match::Failure)
}

/// Parse a CAS `serviceResponse` document.
///
/// `policy` decides how repeated attribute names combine.
pub fn parse_service_response(body: &str, policy: MergePolicy) -> ValidationResult {
    if body.trim().is_empty() {
        return ValidationResult::Failure(FailureReason::Malformed(
            "empty response body".to_string(),
        ));
    }

    let doc = match Document::parse(body) {
        Ok(doc) => doc,
        Err(e) => return ValidationResult::Failure(FailureReason::Malformed(e.to_string())),
    };
    let root = doc.root_element();

    for dialect in DIALECTS {
        match dialect.locate(root) {
            Match::NotApplicable => continue,
            Match::Success(node) => {
                tracing::trace!(?dialect, "Matched authentication success element");
                return match collect_attributes(node, policy, 0) {
                    Ok(attributes) => ValidationResult::Success(attributes),
                    Err(reason) => ValidationResult::Failure(reason),
                };
            }
            Match::Failure(node) => {
                return ValidationResult::Failure(FailureReason::Rejected {
                    code: node.attribute("code").unwrap_or_default().to_string(),
                    description: text_of(node).trim().to_string(),
                });
            }
            Match::Empty => return ValidationResult::Failure(FailureReason::NoSuccessElement),
        }
    }

    ValidationResult::Failure(FailureReason::NoSuccessElement)
}

/// Convert the element children of `node` into an attribute mapping.
///
/// Keys are local names, so any namespace prefix is dropped.
fn collect_attributes(
    node: Node,
    policy: MergePolicy,
    depth: usize,
) -> Result<Attributes, FailureReason> {
    if depth > MAX_ATTRIBUTE_DEPTH {
        return Err(FailureReason::Malformed(
            "attribute nesting is too deep".to_string(),
        ));
    }

    let mut attributes = Attributes::new();
    for child in node.children().filter(Node::is_element) {
        let name = child.tag_name().name();
        if name == PROXIES {
            continue;
        }

        if child.children().any(|c| c.is_element()) {
            let nested = collect_attributes(child, policy, depth + 1)?;
            if name == ATTRIBUTES_WRAPPER {
                attributes.extend(nested);
            } else {
                // Nested blocks are never merged; a repeat replaces the earlier one.
                attributes.insert(name, nested);
            }
        } else {
            attributes.add_scalar(name, text_of(child), policy);
        }
    }
    Ok(attributes)
}

/// Concatenated text content of `node`, untrimmed.
pub(crate) fn text_of(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}
