//! Connected content frames

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a sub-frame; the main (host) frame has none
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameId(pub String);

impl From<&str> for FrameId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A link advertised in a document's metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLink {
    pub href: String,
}

/// Metadata a frame reports about its document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default)]
    pub link: Vec<DocumentLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Reply to the `getDocumentInfo` bridge call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub uri: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub frame_identifier: Option<FrameId>,
}

/// One connected content frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub id: Option<FrameId>,
    pub uri: String,
    pub search_uris: Vec<String>,
    pub document_fingerprint: Option<String>,
    pub is_annotation_fetch_complete: bool,
}

impl Frame {
    /// Build a frame entry from the document info it reported.
    ///
    /// Fingerprinted documents (PDFs) are searched by every advertised link
    /// instead of the frame URI; DOI links are always searched.
    pub fn from_document_info(info: DocumentInfo) -> Self {
        let DocumentInfo {
            uri,
            metadata,
            frame_identifier,
        } = info;

        let mut search_uris = if metadata.document_fingerprint.is_some() {
            metadata.link.iter().map(|l| l.href.clone()).collect()
        } else {
            vec![uri.clone()]
        };
        search_uris.extend(
            metadata
                .link
                .iter()
                .filter(|l| l.href.starts_with("doi:"))
                .map(|l| l.href.clone()),
        );

        Self {
            id: frame_identifier,
            uri,
            search_uris,
            document_fingerprint: metadata.document_fingerprint,
            is_annotation_fetch_complete: false,
        }
    }

    pub fn is_main(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(href: &str) -> DocumentLink {
        DocumentLink {
            href: href.to_string(),
        }
    }

    #[test]
    fn test_html_frame_searches_own_uri() {
        let frame = Frame::from_document_info(DocumentInfo {
            uri: "http://example.com".to_string(),
            metadata: DocumentMetadata {
                link: vec![link("http://example.com/canonical"), link("doi:10.1/x")],
                ..Default::default()
            },
            frame_identifier: None,
        });
        assert!(frame.is_main());
        assert_eq!(frame.search_uris, vec!["http://example.com", "doi:10.1/x"]);
    }

    #[test]
    fn test_pdf_frame_searches_links() {
        let frame = Frame::from_document_info(DocumentInfo {
            uri: "http://example.com/paper.pdf".to_string(),
            metadata: DocumentMetadata {
                link: vec![link("urn:x-pdf:abc"), link("http://example.com/paper.pdf")],
                document_fingerprint: Some("abc".to_string()),
                ..Default::default()
            },
            frame_identifier: Some(FrameId::from("pdf")),
        });
        assert_eq!(
            frame.search_uris,
            vec!["urn:x-pdf:abc", "http://example.com/paper.pdf"]
        );
        assert_eq!(frame.document_fingerprint.as_deref(), Some("abc"));
        assert!(!frame.is_annotation_fetch_complete);
    }

    #[test]
    fn test_document_info_wire_shape() {
        let info: DocumentInfo = serde_json::from_str(
            r#"{"uri":"http://a","metadata":{"link":[]},"frameIdentifier":"f1"}"#,
        )
        .unwrap();
        assert_eq!(info.frame_identifier, Some(FrameId::from("f1")));
    }
}
