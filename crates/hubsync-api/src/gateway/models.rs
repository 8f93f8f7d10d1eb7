// Gateway XML payloads
//
// Requests are `cmd=<name>&data=<gip>...</gip>` bodies sent verbatim
// (the gateway does not URL-decode them). Responses are XML documents
// whose first `<rc>` descendant must read `200`.

use secrecy::{ExposeSecret, SecretString};
use xmltree::{Element, XMLNode};

use crate::error::Error;

pub(crate) const RC_SUCCESS: &str = "200";

const CAROUSEL_FIELDS: &str = "name,image,imageurl,control,power,product,class,realtype,status";

/// A light as reported by `RoomGetCarousel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLight {
    pub did: String,
    pub name: String,
    pub on: bool,
    /// Brightness percent; the gateway's value is only trusted while on.
    pub level: u8,
    pub known: bool,
    pub offline: bool,
}

// ── Request bodies ──────────────────────────────────────────────────

pub(crate) fn login_body(seed: &str) -> String {
    format!(
        "cmd=GWRLogin&data=<gip><version>1</version><email>{seed}</email><password>{seed}</password></gip>"
    )
}

pub(crate) fn carousel_body(token: &SecretString) -> String {
    format!(
        "cmd=GWRBatch&data=<gwrcmds><gwrcmd><gcmd>RoomGetCarousel</gcmd><gdata><gip><version>1</version><token>{}</token><fields>{CAROUSEL_FIELDS}</fields></gip></gdata></gwrcmd></gwrcmds>&fmt=xml",
        token.expose_secret()
    )
}

pub(crate) fn power_body(token: &SecretString, did: &str, on: bool) -> String {
    format!(
        "cmd=DeviceSendCommand&data=<gip><version>1</version><token>{}</token><did>{did}</did><value>{}</value></gip>&fmt=xml",
        token.expose_secret(),
        u8::from(on)
    )
}

pub(crate) fn level_body(token: &SecretString, did: &str, level: u8) -> String {
    format!(
        "cmd=DeviceSendCommand&data=<gip><version>1</version><token>{}</token><did>{did}</did><value>{level}</value><type>level</type></gip>&fmt=xml",
        token.expose_secret()
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Parse a response document and check its return code.
pub(crate) fn parse_response(body: &str) -> Result<Element, Error> {
    let root = Element::parse(body.as_bytes())?;
    match first_text(&root, "rc") {
        Some(rc) if rc == RC_SUCCESS => Ok(root),
        Some(rc) => Err(Error::Protocol {
            message: format!("gateway returned rc {rc}"),
            body: body.to_owned(),
        }),
        None => Err(Error::Protocol {
            message: "gateway response has no return code".into(),
            body: body.to_owned(),
        }),
    }
}

/// Extract the issued token from a `GWRLogin` response.
pub(crate) fn parse_token(root: &Element, body: &str) -> Result<SecretString, Error> {
    first_text(root, "token")
        .filter(|t| !t.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| Error::Protocol {
            message: "pairing response carries no token".into(),
            body: body.to_owned(),
        })
}

/// Every `<device>` in the carousel, in document order.
///
/// Devices without a `did` are dropped; other missing fields default.
pub(crate) fn parse_lights(root: &Element) -> Vec<RawLight> {
    let mut devices = Vec::new();
    collect(root, "device", &mut devices);

    devices
        .into_iter()
        .filter_map(|device| {
            let did = first_text(device, "did").filter(|d| !d.is_empty())?;
            let on = first_text(device, "state").as_deref() == Some("1");
            let level = if on {
                first_text(device, "level")
                    .and_then(|l| l.parse::<u8>().ok())
                    .map_or(0, |l| l.min(100))
            } else {
                0
            };
            Some(RawLight {
                name: first_text(device, "name").unwrap_or_else(|| did.clone()),
                did,
                on,
                level,
                known: first_text(device, "known").as_deref() == Some("1"),
                offline: first_text(device, "offline").as_deref() == Some("1"),
            })
        })
        .collect()
}

fn collect<'a>(element: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in element.children.iter().filter_map(XMLNode::as_element) {
        if child.name == name {
            out.push(child);
        }
        collect(child, name, out);
    }
}

fn first<'a>(element: &'a Element, name: &str) -> Option<&'a Element> {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                first(child, name)
            }
        })
}

fn first_text(element: &Element, name: &str) -> Option<String> {
    first(element, name).map(|e| {
        e.get_text()
            .map(|t| t.trim().to_owned())
            .unwrap_or_default()
    })
}
