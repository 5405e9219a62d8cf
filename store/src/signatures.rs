use crate::errors::{Result, decode_all, encode};
use crate::kv::{Filter, KeyValueStore, PutCondition, ScanRequest, scan_all};
use crate::page_token::PageToken;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureType {
    /// Individual CLA.
    Cla,
    /// Corporate CLA.
    Ccla,
    /// Employee acknowledgement under a corporate CLA.
    Ecla,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SignatureType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SignatureType::Cla => "cla",
            SignatureType::Ccla => "ccla",
            SignatureType::Ecla => "ecla",
            SignatureType::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    User,
    Company,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A signature row. Field names follow the signatures table so the same type
/// decodes both stored items and change-stream images.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Signature {
    pub signature_id: String,
    pub signature_type: SignatureType,
    pub signature_reference_type: ReferenceType,
    pub signature_reference_id: String,
    pub signature_reference_name: String,
    /// The CLA group the signature belongs to.
    #[serde(rename = "signature_project_id")]
    pub project_id: String,
    pub signature_signed: bool,
    pub signature_approved: bool,
    /// Usernames of the signature's managers, in grant order.
    pub signature_acl: Vec<String>,
    #[serde(rename = "date_created")]
    pub signature_created: String,
    #[serde(rename = "signature_document_major_version")]
    pub major_version: Option<i64>,
    #[serde(rename = "signature_document_minor_version")]
    pub minor_version: Option<i64>,
    /// Set on employee signatures: the company the employee signed under.
    pub signature_user_ccla_company_id: Option<String>,
}

impl Signature {
    pub fn version(&self) -> String {
        format!(
            "v{}.{}",
            self.major_version.unwrap_or_default(),
            self.minor_version.unwrap_or_default()
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignaturePage {
    pub signatures: Vec<Signature>,
    pub next_page_token: Option<PageToken>,
}

#[async_trait]
pub trait SignatureRepository: Send + Sync {
    /// Signatures whose reference is the company, optionally of one type.
    async fn get_company_signatures(
        &self,
        company_id: &str,
        signature_type: Option<SignatureType>,
        page_token: Option<PageToken>,
    ) -> Result<SignaturePage>;

    async fn get_project_company_signatures(
        &self,
        company_id: &str,
        project_id: &str,
        signed: Option<bool>,
        approved: Option<bool>,
        page_token: Option<PageToken>,
    ) -> Result<SignaturePage>;

    /// All employee signatures made under the company for a CLA group.
    async fn get_project_company_employee_signatures(
        &self,
        company_id: &str,
        project_id: &str,
    ) -> Result<Vec<Signature>>;

    async fn put_signature(&self, signature: &Signature) -> Result<()>;
}

/// Follows page tokens until every company signature of `signature_type` is read.
pub async fn all_company_signatures(
    repo: &dyn SignatureRepository,
    company_id: &str,
    signature_type: Option<SignatureType>,
) -> Result<Vec<Signature>> {
    let mut signatures = Vec::new();
    let mut page_token = None;
    loop {
        let page = repo
            .get_company_signatures(company_id, signature_type, page_token)
            .await?;
        signatures.extend(page.signatures);
        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }
    Ok(signatures)
}

pub struct KvSignatureRepository {
    kv: Arc<dyn KeyValueStore>,
    table: String,
}

impl KvSignatureRepository {
    pub fn new(kv: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        KvSignatureRepository {
            kv,
            table: table.into(),
        }
    }

    async fn scan_page(
        &self,
        filter: Filter,
        page_token: Option<PageToken>,
    ) -> Result<SignaturePage> {
        let request = ScanRequest::filtered(filter).with_page_token(page_token);
        let page = self.kv.scan(&self.table, &request).await?;
        Ok(SignaturePage {
            signatures: decode_all("signature", page.items)?,
            next_page_token: page.next_page_token,
        })
    }
}

#[async_trait]
impl SignatureRepository for KvSignatureRepository {
    async fn get_company_signatures(
        &self,
        company_id: &str,
        signature_type: Option<SignatureType>,
        page_token: Option<PageToken>,
    ) -> Result<SignaturePage> {
        let mut filter = Filter::eq("signature_reference_id", company_id)
            .and(Filter::eq("signature_reference_type", "company"));
        if let Some(signature_type) = signature_type {
            filter = filter.and(Filter::eq("signature_type", signature_type.as_str()));
        }
        self.scan_page(filter, page_token).await
    }

    async fn get_project_company_signatures(
        &self,
        company_id: &str,
        project_id: &str,
        signed: Option<bool>,
        approved: Option<bool>,
        page_token: Option<PageToken>,
    ) -> Result<SignaturePage> {
        let mut filter = Filter::eq("signature_reference_id", company_id)
            .and(Filter::eq("signature_project_id", project_id));
        if let Some(signed) = signed {
            filter = filter.and(Filter::eq("signature_signed", signed));
        }
        if let Some(approved) = approved {
            filter = filter.and(Filter::eq("signature_approved", approved));
        }
        self.scan_page(filter, page_token).await
    }

    async fn get_project_company_employee_signatures(
        &self,
        company_id: &str,
        project_id: &str,
    ) -> Result<Vec<Signature>> {
        let filter = Filter::eq("signature_project_id", project_id)
            .and(Filter::eq("signature_user_ccla_company_id", company_id))
            .and(Filter::eq("signature_reference_type", "user"));
        let items = scan_all(self.kv.as_ref(), &self.table, ScanRequest::filtered(filter)).await?;
        decode_all("signature", items)
    }

    async fn put_signature(&self, signature: &Signature) -> Result<()> {
        let item = encode("signature", signature)?;
        self.kv
            .put_item(&self.table, item, PutCondition::Always)
            .await?;
        Ok(())
    }
}
