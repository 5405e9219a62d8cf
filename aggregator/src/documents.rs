use store::signatures::Signature;
use url::Url;

/// Builds download links for signed documents.
#[derive(Clone, Debug)]
pub struct DocumentLinker {
    base: String,
}

impl DocumentLinker {
    pub fn new(base: &Url) -> Self {
        DocumentLinker {
            base: base.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/contract-group/{claGroupID}/{signatureType}/{referenceID}/{signatureID}.pdf`
    pub fn signed_document_url(&self, signature: &Signature) -> String {
        format!(
            "{}/contract-group/{}/{}/{}/{}.pdf",
            self.base,
            signature.project_id,
            signature.signature_type.as_str(),
            signature.signature_reference_id,
            signature.signature_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::signatures::SignatureType;

    #[test]
    fn test_signed_document_url() {
        let linker = DocumentLinker::new(&Url::parse("https://docs.example.org/").unwrap());
        let signature = Signature {
            signature_id: "sig1".into(),
            signature_type: SignatureType::Ccla,
            signature_reference_id: "company1".into(),
            project_id: "group1".into(),
            ..Default::default()
        };
        assert_eq!(
            linker.signed_document_url(&signature),
            "https://docs.example.org/contract-group/group1/ccla/company1/sig1.pdf"
        );
    }
}
