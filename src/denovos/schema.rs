//! Data structures for candidate de novo calls.

use crate::err::DenovoError;

/// Variant class, derived from the allele lengths.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display,
)]
pub enum VarClass {
    /// Single nucleotide variant.
    #[strum(serialize = "snv")]
    Snv,
    /// Insertion or deletion (any multi-base allele).
    #[strum(serialize = "indel")]
    Indel,
}

impl VarClass {
    pub fn from_alleles(reference: &str, alternative: &str) -> Self {
        if reference.len() == 1 && alternative.len() == 1 {
            VarClass::Snv
        } else {
            VarClass::Indel
        }
    }
}

/// Identifies the same physical event across individuals.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, derive_new::new,
)]
pub struct SiteKey {
    pub chrom: String,
    pub pos: i32,
    pub alternative: String,
}

/// One candidate call, i.e., one (person, site) pair under evaluation.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CandidateCall {
    /// Identifier of the child carrying the candidate.
    pub person_id: String,
    /// Identifier of the child's family.
    pub family_id: String,
    /// Canonical chromosome name (no `chr` prefix).
    pub chrom: String,
    /// 1-based position.
    pub pos: i32,
    /// Reference allele.
    pub reference: String,
    /// Alternate allele.
    pub alternative: String,
    /// HGNC gene symbol.
    pub symbol: String,
    /// Transcript consequence, possibly still `|`-separated until tidied.
    pub consequence: String,
    /// Stranded depth encodings of child, mother, and father.
    pub dp4_child: String,
    pub dp4_mother: String,
    pub dp4_father: String,
    /// Raw maximal population allele frequency, if the column is present.
    pub max_af: Option<String>,
    /// Presence flags in the trio members' VCF files, if the columns are present.
    pub in_child_vcf: Option<u8>,
    pub in_mother_vcf: Option<u8>,
    pub in_father_vcf: Option<u8>,
}

impl CandidateCall {
    pub fn site_key(&self) -> SiteKey {
        SiteKey::new(self.chrom.clone(), self.pos, self.alternative.clone())
    }

    pub fn var_class(&self) -> VarClass {
        VarClass::from_alleles(&self.reference, &self.alternative)
    }

    /// Raw depth encoding of the given trio member.
    pub fn dp4(&self, member: TrioMember) -> &str {
        match member {
            TrioMember::Child => &self.dp4_child,
            TrioMember::Mother => &self.dp4_mother,
            TrioMember::Father => &self.dp4_father,
        }
    }
}

/// Stranded read counts of one individual at one site.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_new::new,
)]
pub struct Dp4 {
    pub ref_fwd: u32,
    pub ref_rev: u32,
    pub alt_fwd: u32,
    pub alt_rev: u32,
}

impl Dp4 {
    /// Number of reads supporting the alternate allele.
    pub fn alt(&self) -> u64 {
        self.alt_fwd as u64 + self.alt_rev as u64
    }

    /// Number of reads supporting the reference allele.
    pub fn reference(&self) -> u64 {
        self.ref_fwd as u64 + self.ref_rev as u64
    }

    pub fn depth(&self) -> u64 {
        self.alt() + self.reference()
    }
}

/// Member of a trio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum TrioMember {
    #[strum(serialize = "child")]
    Child,
    #[strum(serialize = "mother")]
    Mother,
    #[strum(serialize = "father")]
    Father,
}

impl TrioMember {
    /// Name of the input column holding the member's depth encoding.
    pub fn dp4_column(&self) -> &'static str {
        match self {
            TrioMember::Child => "dp4_child",
            TrioMember::Mother => "dp4_mother",
            TrioMember::Father => "dp4_father",
        }
    }
}

/// Stranded read counts for the whole trio at one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrioCounts {
    pub child: Dp4,
    pub mother: Dp4,
    pub father: Dp4,
}

impl TrioCounts {
    pub fn member(&self, member: TrioMember) -> &Dp4 {
        match member {
            TrioMember::Child => &self.child,
            TrioMember::Mother => &self.mother,
            TrioMember::Father => &self.father,
        }
    }

    /// Smaller of the two parental alternate read counts.
    pub fn min_parent_alt(&self) -> u64 {
        self.mother.alt().min(self.father.alt())
    }
}

/// Sequence Ontology consequence terms, ordered from most to least severe.
///
/// The derived `Ord` is the severity order, so a smaller value is more
/// severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Consequence {
    TranscriptAblation,
    SpliceDonorVariant,
    SpliceAcceptorVariant,
    StopGained,
    FrameshiftVariant,
    InitiatorCodonVariant,
    StopLost,
    StartLost,
    TranscriptAmplification,
    ConservedExonTerminusVariant,
    InframeInsertion,
    InframeDeletion,
    MissenseVariant,
    ProteinAlteringVariant,
    SpliceRegionVariant,
    IncompleteTerminalCodonVariant,
    StopRetainedVariant,
    SynonymousVariant,
    CodingSequenceVariant,
    #[strum(serialize = "mature_miRNA_variant")]
    #[serde(rename = "mature_miRNA_variant")]
    MatureMirnaVariant,
    #[strum(serialize = "5_prime_UTR_variant")]
    #[serde(rename = "5_prime_UTR_variant")]
    FivePrimeUtrVariant,
    #[strum(serialize = "3_prime_UTR_variant")]
    #[serde(rename = "3_prime_UTR_variant")]
    ThreePrimeUtrVariant,
    NonCodingExonVariant,
    NonCodingTranscriptExonVariant,
    IntronVariant,
    #[strum(serialize = "NMD_transcript_variant")]
    #[serde(rename = "NMD_transcript_variant")]
    NmdTranscriptVariant,
    NonCodingTranscriptVariant,
    UpstreamGeneVariant,
    DownstreamGeneVariant,
    #[strum(serialize = "TFBS_ablation")]
    #[serde(rename = "TFBS_ablation")]
    TfbsAblation,
    #[strum(serialize = "TFBS_amplification")]
    #[serde(rename = "TFBS_amplification")]
    TfbsAmplification,
    #[strum(serialize = "TF_binding_site_variant")]
    #[serde(rename = "TF_binding_site_variant")]
    TfBindingSiteVariant,
    RegulatoryRegionAblation,
    RegulatoryRegionAmplification,
    RegulatoryRegionVariant,
    FeatureElongation,
    FeatureTruncation,
    IntergenicVariant,
}

impl Consequence {
    /// Severity rank, `0` being the most severe.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Look up a consequence term, failing for terms outside of the table.
    pub fn parse(value: &str) -> Result<Self, DenovoError> {
        value
            .trim()
            .parse()
            .map_err(|_| DenovoError::UndefinedConsequence {
                value: value.to_string(),
            })
    }

    /// Whether the consequence hits coding sequence or a splice site.
    pub fn is_coding_or_splicing(&self) -> bool {
        matches!(
            self,
            Consequence::CodingSequenceVariant
                | Consequence::ConservedExonTerminusVariant
                | Consequence::FrameshiftVariant
                | Consequence::InframeDeletion
                | Consequence::InframeInsertion
                | Consequence::InitiatorCodonVariant
                | Consequence::MissenseVariant
                | Consequence::ProteinAlteringVariant
                | Consequence::SpliceAcceptorVariant
                | Consequence::SpliceDonorVariant
                | Consequence::SpliceRegionVariant
                | Consequence::StartLost
                | Consequence::StopGained
                | Consequence::StopLost
                | Consequence::SynonymousVariant
        )
    }
}
