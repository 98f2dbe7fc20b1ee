//! `imsmanifest.xml` parsing.
//!
//! Only the handful of fields the SCORM activity serializer needs are read:
//! the manifest identifier, the first organization (identifier and title),
//! that organization's first item (identifier and title) and the `href` of the
//! first resource. Lookups are namespace-aware: apart from the root element,
//! only elements in the IMS Content Packaging namespace are considered.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};

use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};

/// IMS Content Packaging 1.1 namespace.
pub const IMSCP_NS: &str = "http://www.imsglobal.org/xsd/imscp_v1p1";

/// Fields taken from a package's `imsmanifest.xml`. Each may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScormManifest {
    pub identifier: Option<String>,
    pub organization_identifier: Option<String>,
    pub organization_title: Option<String>,
    pub item_identifier: Option<String>,
    pub item_title: Option<String>,
    pub resource_href: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Elem {
    Root,
    Organizations,
    Organization,
    OrganizationTitle,
    Item,
    ItemTitle,
    Resources,
    Resource,
    Other,
}

#[derive(Default)]
struct Seen {
    organizations: bool,
    organization: bool,
    item: bool,
    resources: bool,
    resource: bool,
}

/// Parse the raw bytes of an `imsmanifest.xml`.
///
/// Malformed XML (including a truncated document) yields
/// [`Error::ManifestParse`].
pub fn parse_manifest(bytes: &[u8]) -> Result<ScormManifest> {
    let text = decode_text(bytes, extract_xml_encoding(bytes));
    let mut reader = NsReader::from_str(&text);

    let mut manifest = ScormManifest::default();
    let mut seen = Seen::default();
    let mut stack: Vec<Elem> = Vec::new();
    let mut title_buf = String::new();
    let mut saw_root = false;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::ManifestParse(e.to_string()))?;
        let in_imscp = matches!(ns, ResolveResult::Bound(Namespace(n)) if n == IMSCP_NS.as_bytes());

        match event {
            Event::Start(e) => {
                let elem = classify(&e, in_imscp, stack.last().copied(), &mut seen);
                capture_attributes(&e, elem, &mut manifest);
                if matches!(elem, Elem::OrganizationTitle | Elem::ItemTitle) {
                    title_buf.clear();
                }
                saw_root = true;
                stack.push(elem);
            }
            Event::Empty(e) => {
                let elem = classify(&e, in_imscp, stack.last().copied(), &mut seen);
                capture_attributes(&e, elem, &mut manifest);
                saw_root = true;
            }
            Event::Text(t) => {
                if is_title(stack.last()) {
                    title_buf.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::CData(t) => {
                if is_title(stack.last()) {
                    title_buf.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::GeneralRef(r) => {
                if is_title(stack.last()) {
                    let entity = String::from_utf8_lossy(r.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        title_buf.push_str(&resolved);
                    }
                }
            }
            Event::End(_) => {
                let title = title_buf.trim();
                match stack.pop() {
                    Some(Elem::OrganizationTitle) if !title.is_empty() => {
                        manifest.organization_title = Some(title.to_string());
                    }
                    Some(Elem::ItemTitle) if !title.is_empty() => {
                        manifest.item_title = Some(title.to_string());
                    }
                    Some(_) => {}
                    None => {
                        return Err(Error::ManifestParse("unbalanced end tag".into()));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(Error::ManifestParse("no root element".into()));
    }
    if !stack.is_empty() {
        return Err(Error::ManifestParse("unexpected end of document".into()));
    }
    Ok(manifest)
}

fn is_title(elem: Option<&Elem>) -> bool {
    matches!(elem, Some(Elem::OrganizationTitle | Elem::ItemTitle))
}

fn classify(e: &BytesStart<'_>, in_imscp: bool, parent: Option<Elem>, seen: &mut Seen) -> Elem {
    let Some(parent) = parent else {
        return Elem::Root;
    };
    if !in_imscp {
        return Elem::Other;
    }
    let local = e.local_name();
    match (parent, local.as_ref()) {
        (Elem::Root, b"organizations") if !seen.organizations => {
            seen.organizations = true;
            Elem::Organizations
        }
        (Elem::Organizations, b"organization") if !seen.organization => {
            seen.organization = true;
            Elem::Organization
        }
        (Elem::Organization, b"title") => Elem::OrganizationTitle,
        (Elem::Organization, b"item") if !seen.item => {
            seen.item = true;
            Elem::Item
        }
        (Elem::Item, b"title") => Elem::ItemTitle,
        (Elem::Root, b"resources") if !seen.resources => {
            seen.resources = true;
            Elem::Resources
        }
        (Elem::Resources, b"resource") if !seen.resource => {
            seen.resource = true;
            Elem::Resource
        }
        _ => Elem::Other,
    }
}

fn capture_attributes(e: &BytesStart<'_>, elem: Elem, manifest: &mut ScormManifest) {
    let (wanted, slot) = match elem {
        Elem::Root => (&b"identifier"[..], &mut manifest.identifier),
        Elem::Organization => (&b"identifier"[..], &mut manifest.organization_identifier),
        Elem::Item => (&b"identifier"[..], &mut manifest.item_identifier),
        Elem::Resource => (&b"href"[..], &mut manifest.resource_href),
        _ => return,
    };
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == wanted {
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = match quick_xml::escape::unescape(&raw) {
                Ok(v) => v.into_owned(),
                Err(_) => raw,
            };
            *slot = Some(value);
        }
    }
}

/// Resolve an XML entity reference (the name between `&` and `;`).
///
/// Covers the five predefined entities and numeric character references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity.strip_prefix("#x") {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse().ok()?
    };
    char::from_u32(code).map(|c| c.to_string())
}
