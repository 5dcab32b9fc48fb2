// src/extractors/definitions.rs

use clap::ValueEnum;

/// The report sections this tool knows how to find.
///
/// Declaration order matters: it is the order sections are tried, written and,
/// when two sections start at the same offset, the order they are resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum)]
pub enum SectionId {
    InstitutionalFramework,
    NationalPolicyFramework,
    GhgInventory,
    AdaptationVulnerability,
    ClimateTransparency,
    OfficialReporting,
    KeyBarriers,
    NdcTracking,
    SupportNeededReceived,
    OtherBaselineInitiatives,
}

/// A named section with its ordered heading patterns, ordered body patterns
/// and fallback keywords. Patterns are plain regex source; flags are applied
/// by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDefinition {
    pub name: String,
    pub headings: Vec<String>,
    pub patterns: Vec<String>,
    pub keywords: Vec<String>,
}

impl SectionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headings: Vec::new(),
            patterns: Vec::new(),
            keywords: Vec::new(),
        }
    }

    pub fn headings<I, S>(mut self, headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headings.extend(headings.into_iter().map(Into::into));
        self
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }
}

struct SectionTable {
    name: &'static str,
    bundle: &'static str,
    directory: &'static str,
    headings: &'static [&'static str],
    patterns: &'static [&'static str],
    keywords: &'static [&'static str],
}

const INSTITUTIONAL_FRAMEWORK: SectionTable = SectionTable {
    name: "Institutional framework for climate action",
    bundle: "Institutional_framework_bundle.json",
    directory: "Institutional_framework_for_climate_action",
    headings: &[
        r"^\s*[ivxlcdm]+\.\s*Institutional\sframework[^\n]*",
        r"^\s*Institutional\sframework[^\n]*",
        r"^\s*Institutional\sarrangements[^\n]*",
    ],
    patterns: &[
        r"Institutional\sframework(?:\sfor\s(?:climate|mitigation|adaptation|the\simplementation))?",
        r"Institutional\sarrangements\s(?:for|on)\s(?:climate|implementation)",
        r"Institutional\ssetup",
    ],
    keywords: &[
        "institutional framework",
        "institutional arrangements",
        "institutional setup",
        "inter-ministerial committee",
        "national climate change committee",
    ],
};

const NATIONAL_POLICY_FRAMEWORK: SectionTable = SectionTable {
    name: "National policy framework",
    bundle: "National_policy_framework_bundle.json",
    directory: "National_policy_framework",
    headings: &[
        r"^\s*[ivxlcdm]+\.\s*National\s(?:policy|strategic)\sframework[^\n]*",
        r"^\s*National\s(?:policy|strategic)\sframework[^\n]*",
        r"^\s*Policy\sand\sregulatory\sframework[^\n]*",
    ],
    patterns: &[
        r"National\s(?:policy|strategic)\sframework",
        r"National\s(?:strategy|policies)\s(?:for|on)\sclimate",
        r"Policy\sand\sregulatory\sframework",
    ],
    keywords: &[
        "national policy framework",
        "national strategic framework",
        "regulatory framework",
        "climate change policy",
        "climate change law",
    ],
};

const GHG_INVENTORY: SectionTable = SectionTable {
    name: "GHG Inventory Module",
    bundle: "GHG_inventory_bundle.json",
    directory: "GHG_inventory_module",
    headings: &[
        r"^\s*[IVXLCDM]+\.\s*National\s+greenhouse\s+gas\s+inventory[^\n]*",
        r"^\s*National\s+greenhouse\s+gas\s+inventory[^\n]*",
        r"^\s*National\s+GHG\s+inventory[^\n]*",
        r"^\s*Greenhouse\s+gas\s+emissions[^\n]*",
    ],
    patterns: &[
        r"National\s+greenhouse\s+gas\s+inventory",
        r"Greenhouse\s+gas\s+emissions",
    ],
    keywords: &[
        "greenhouse gas inventory",
        "ghg inventory",
        "inventory system",
        "emission factors",
        "ipcc guidelines",
    ],
};

const ADAPTATION_VULNERABILITY: SectionTable = SectionTable {
    name: "Adaptation and Vulnerability Module",
    bundle: "Adaptation_vulnerability_bundle.json",
    directory: "Adaptation_and_vulnerability_module",
    headings: &[
        r"^\s*[IVXLCDM]+\.\s*Vulnerability\s+and\s+adaptation[^\n]*",
        r"^\s*Vulnerability\s+and\s+adaptation[^\n]*",
        r"^\s*Climate\s+change\s+impacts\s+and\s+adaptation[^\n]*",
        r"^\s*Adaptation\s+actions[^\n]*",
    ],
    patterns: &[
        r"Vulnerability\s+and\s+adaptation",
        r"Climate\s+change\s+impacts\s+and\s+adaptation",
        r"Adaptation\s+actions",
    ],
    keywords: &[
        "vulnerability and adaptation",
        "vulnerability assessment",
        "adaptation actions",
        "adaptation measures",
        "climate change impacts",
    ],
};

const CLIMATE_TRANSPARENCY: SectionTable = SectionTable {
    name: "Climate Transparency",
    bundle: "Climate_transparency_bundle.json",
    directory: "Climate_transparency",
    headings: &[
        r"^\s*Climate\s+transparency\s+in\s+[^\n]*",
        r"^\s*Climate\s+transparency\s+in\s+the\s+country[^\n]*",
        r"^\s*Climate\s+transparency[^\n]*",
        r"^\s*Progress\s+in\s+the\s+four\s+modules\s+of\s+the\s+Enhanced\s+Transparency\s+Framework[^\n]*",
    ],
    patterns: &[
        r"Climate\s+transparency\s+in\s+[^\n]+",
        r"Climate\s+transparency\s+in\s+the\s+country",
        r"Climate\s+transparency",
        r"Progress\s+in\s+the\s+four\s+modules\s+of\s+the\s+Enhanced\s+Transparency\s+Framework",
    ],
    keywords: &[
        "climate transparency",
        "enhanced transparency framework",
        "transparency framework",
        "mrv system",
    ],
};

const OFFICIAL_REPORTING: SectionTable = SectionTable {
    name: "Official Reporting to UNFCCC",
    bundle: "Official_reporting_UNFCCC_bundle.json",
    directory: "Official_reporting_UNFCCC",
    headings: &[
        r"^\s*Official\s+reports?\s+to\s+the\s+UNFCCC[^\n]*",
        r"^\s*Official\s+reporting\s+to\s+the\s+UNFCCC[^\n]*",
        r"^\s*Reports\s+submitted\s+to\s+the\s+UNFCCC[^\n]*",
        r"^\s*Table\s*\d+\.?\s*Official\s+reports\s+to\s+the\s+UNFCCC[^\n]*",
    ],
    patterns: &[
        r"Official\s+reports?\s+to\s+the\s+UNFCCC",
        r"Official\s+reporting\s+to\s+the\s+UNFCCC",
        r"Reports\s+submitted\s+to\s+the\s+UNFCCC",
    ],
    keywords: &[
        "official reports to the unfccc",
        "reports submitted to the unfccc",
        "national communication",
        "biennial update report",
        "biennial transparency report",
    ],
};

const KEY_BARRIERS: SectionTable = SectionTable {
    name: "Key Barriers",
    bundle: "Key_barriers_bundle.json",
    directory: "Key_barriers",
    headings: &[
        r"^\s*Key\s+barriers[^\n]*",
        r"^\s*Main\s+barriers[^\n]*",
        r"^\s*Constraints\s+and\s+gaps[^\n]*",
        r"^\s*Constraints,\s+gaps\s+and\s+needs[^\n]*",
        r"^\s*Challenges\s+and\s+gaps[^\n]*",
        r"^\s*Barriers\s+to\s+enhanced\s+transparency[^\n]*",
    ],
    patterns: &[
        r"Key\s+barriers",
        r"Main\s+barriers",
        r"Constraints\s+and\s+gaps",
        r"Constraints,\s+gaps\s+and\s+needs",
        r"Challenges\s+and\s+gaps",
        r"Barriers\s+to\s+enhanced\s+transparency",
    ],
    keywords: &[
        "barriers",
        "constraints and gaps",
        "challenges and gaps",
        "capacity gaps",
    ],
};

const NDC_TRACKING: SectionTable = SectionTable {
    name: "NDC Tracking Module",
    bundle: "NDC_tracking_bundle.json",
    directory: "NDC_tracking_module",
    headings: &[r"^[^\n]*NDC\s+Tracking\s+Module[^\n]*"],
    patterns: &[],
    keywords: &[
        "ndc tracking module",
        "ndc tracking",
        "tracking progress",
        "progress toward achieving its 2030 emission reduction target",
        "progress toward achieving its",
        "description of the ndc",
        "mitigation policies and measures",
        "mitigation actions and their effects",
        "tracking ndc",
        "tracking systems for nationally determined contributions",
        "ndc 2.0",
        "ndc 3.0",
        "ndcs",
    ],
};

const SUPPORT_NEEDED_RECEIVED: SectionTable = SectionTable {
    name: "Support Needed and Received Module",
    bundle: "Support_needed_received_bundle.json",
    directory: "Support_needed_and_received_module",
    headings: &[r"^[^\n]*Support\s+Needed\s+and\s+Received\s+Module[^\n]*"],
    patterns: &[],
    keywords: &[
        "support needed and received module",
        "support needed and received",
        "information on financial support needed",
        "information on financial support received",
        "support flows",
        "support needed",
        "support received",
        "support for the implementation of the ndc",
        "climate finance",
        "means of implementation",
        "technology development and transfer support needed",
        "capacity-building support needed",
        "capacity-building support received",
    ],
};

const OTHER_BASELINE_INITIATIVES: SectionTable = SectionTable {
    name: "Other baseline initiatives",
    bundle: "Other_baseline_initiatives_bundle.json",
    directory: "Other_baseline_initiatives",
    headings: &[r"^[^\n]*Other\s+baseline\s+initiatives[^\n]*"],
    patterns: &[],
    keywords: &[
        "other baseline initiatives",
        "baseline analysis",
        "other initiatives",
        "ongoing transparency projects and initiatives",
        "transparency initiatives",
        "this cbit project is aligned with and complements other initiatives",
        "baseline of components",
        "baseline of component",
    ],
};

impl SectionId {
    pub const ALL: [SectionId; 10] = [
        SectionId::InstitutionalFramework,
        SectionId::NationalPolicyFramework,
        SectionId::GhgInventory,
        SectionId::AdaptationVulnerability,
        SectionId::ClimateTransparency,
        SectionId::OfficialReporting,
        SectionId::KeyBarriers,
        SectionId::NdcTracking,
        SectionId::SupportNeededReceived,
        SectionId::OtherBaselineInitiatives,
    ];

    fn table(self) -> &'static SectionTable {
        match self {
            SectionId::InstitutionalFramework => &INSTITUTIONAL_FRAMEWORK,
            SectionId::NationalPolicyFramework => &NATIONAL_POLICY_FRAMEWORK,
            SectionId::GhgInventory => &GHG_INVENTORY,
            SectionId::AdaptationVulnerability => &ADAPTATION_VULNERABILITY,
            SectionId::ClimateTransparency => &CLIMATE_TRANSPARENCY,
            SectionId::OfficialReporting => &OFFICIAL_REPORTING,
            SectionId::KeyBarriers => &KEY_BARRIERS,
            SectionId::NdcTracking => &NDC_TRACKING,
            SectionId::SupportNeededReceived => &SUPPORT_NEEDED_RECEIVED,
            SectionId::OtherBaselineInitiatives => &OTHER_BASELINE_INITIATIVES,
        }
    }

    /// Human-readable section name, as stored in entries and country records.
    pub fn display_name(self) -> &'static str {
        self.table().name
    }

    /// File name of the per-section bundle inside the output directory.
    pub fn bundle_file(self) -> &'static str {
        self.table().bundle
    }

    /// Directory holding per-document files for this section.
    pub fn directory(self) -> &'static str {
        self.table().directory
    }

    pub fn from_display_name(name: &str) -> Option<SectionId> {
        SectionId::ALL
            .into_iter()
            .find(|id| id.display_name().eq_ignore_ascii_case(name.trim()))
    }

    /// Builds the pattern set for this section. A known country adds
    /// country-specific Climate Transparency patterns ahead of the generic ones.
    pub fn definition(self, country: Option<&str>) -> SectionDefinition {
        let table = self.table();
        let mut headings = Vec::new();
        let mut patterns = Vec::new();

        if let (SectionId::ClimateTransparency, Some(country)) = (self, country) {
            let escaped = regex::escape(country.trim());
            headings.push(format!(r"^\s*Climate\s+transparency\s+in\s+{}[^\n]*", escaped));
            patterns.push(format!(r"Climate\s+transparency\s+in\s+{}", escaped));
        }

        SectionDefinition::new(table.name)
            .headings(headings)
            .headings(table.headings.iter().copied())
            .patterns(patterns)
            .patterns(table.patterns.iter().copied())
            .keywords(table.keywords.iter().copied())
    }
}

/// Definitions for the requested sections, in catalogue order.
pub fn definitions_for(sections: &[SectionId], country: Option<&str>) -> Vec<SectionDefinition> {
    let mut ids = sections.to_vec();
    ids.sort();
    ids.dedup();
    ids.into_iter().map(|id| id.definition(country)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    #[test]
    fn test_every_catalogue_pattern_compiles() {
        for id in SectionId::ALL {
            let def = id.definition(Some("Côte d'Ivoire (the)"));
            for pattern in def.headings.iter().chain(def.patterns.iter()) {
                assert!(
                    RegexBuilder::new(pattern).case_insensitive(true).multi_line(true).build().is_ok(),
                    "pattern for {:?} does not compile: {}",
                    id,
                    pattern
                );
            }
            assert!(!def.keywords.is_empty(), "{:?} has no fallback keywords", id);
            assert!(!def.headings.is_empty(), "{:?} has no headings", id);
        }
    }

    #[test]
    fn test_country_specific_transparency_patterns_come_first() {
        let def = SectionId::ClimateTransparency.definition(Some("Cuba"));
        assert!(def.headings[0].contains("Cuba"));
        assert!(def.patterns[0].contains("Cuba"));

        let generic = SectionId::ClimateTransparency.definition(None);
        assert!(!generic.headings[0].contains("Cuba"));
        assert_eq!(def.headings.len(), generic.headings.len() + 1);

        // Other sections ignore the country
        assert_eq!(
            SectionId::KeyBarriers.definition(Some("Cuba")),
            SectionId::KeyBarriers.definition(None)
        );
    }

    #[test]
    fn test_display_name_round_trip_and_cli_names() {
        for id in SectionId::ALL {
            assert_eq!(SectionId::from_display_name(id.display_name()), Some(id));
        }
        assert_eq!(SectionId::from_display_name("key barriers"), Some(SectionId::KeyBarriers));
        assert_eq!(
            SectionId::from_str("ghg-inventory", true).ok(),
            Some(SectionId::GhgInventory)
        );
    }

    #[test]
    fn test_definitions_for_dedups_and_orders() {
        let defs = definitions_for(
            &[SectionId::KeyBarriers, SectionId::GhgInventory, SectionId::KeyBarriers],
            None,
        );
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["GHG Inventory Module", "Key Barriers"]);
    }
}
