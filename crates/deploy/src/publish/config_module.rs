//! In-place patching of the generated browser config module.
//!
//! Only the quoted address literal bound to each label is replaced. Every other
//! byte of the file is preserved.

use alloy_core::primitives::Address;
use regex::Regex;

use crate::error::ArtifactError;

fn label_pattern(label: &str) -> Result<Regex, ArtifactError> {
    if label.is_empty() || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(ArtifactError::InvalidLabel {
            label: label.to_string(),
            reason: "labels must be plain identifiers".to_string(),
        });
    }

    // The label must not be the tail of a longer identifier.
    Regex::new(&format!(
        r#"(?P<prefix>(?:^|[^A-Za-z0-9_$]){}\s*:\s*")0x[0-9a-fA-F]{{40}}""#,
        regex::escape(label)
    ))
    .map_err(|e| ArtifactError::InvalidLabel {
        label: label.to_string(),
        reason: e.to_string(),
    })
}

/// Replace the address assigned to `label` in `content`.
///
/// Exactly one assignment must exist: none means the template is stale, more
/// than one means we cannot tell which one the browser reads.
pub fn patch_address(content: &str, label: &str, address: Address) -> Result<String, ArtifactError> {
    let pattern = label_pattern(label)?;

    let count = pattern.find_iter(content).count();
    match count {
        0 => {
            return Err(ArtifactError::PatternNotFound {
                label: label.to_string(),
            });
        }
        1 => {}
        count => {
            return Err(ArtifactError::AmbiguousPattern {
                label: label.to_string(),
                count,
            });
        }
    }

    let replacement = format!("${{prefix}}{address}\"");
    Ok(pattern.replace(content, replacement.as_str()).into_owned())
}

/// Apply every `(label, address)` pair to `content`.
pub fn patch_all<'a>(
    content: &str,
    assignments: impl IntoIterator<Item = (&'a str, Address)>,
) -> Result<String, ArtifactError> {
    assignments
        .into_iter()
        .try_fold(content.to_string(), |content, (label, address)| {
            patch_address(&content, label, address)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"const GreenDishConfig = {
    // Contract addresses will be updated by deployment script
    addresses: {
        GreenCoin: "0x5FbDB2315678afecb367f032d93F642f64180aa3", // Hardhat deployed address
        GreenDish: "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"  // Hardhat deployed address
    },
    loadDeploymentAddresses: async function () {
        console.log("GreenDish:", this.addresses.GreenDish);
    }
};
"#;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn test_patch_replaces_only_the_literals() {
        let patched = patch_all(TEMPLATE, [("GreenCoin", addr(0x11)), ("GreenDish", addr(0x22))]).unwrap();

        let expected = TEMPLATE
            .replace("0x5FbDB2315678afecb367f032d93F642f64180aa3", &addr(0x11).to_string())
            .replace("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512", &addr(0x22).to_string());
        assert_eq!(patched, expected);

        let again = patch_all(&patched, [("GreenCoin", addr(0x11)), ("GreenDish", addr(0x22))]).unwrap();
        assert_eq!(again, patched);
    }

    #[test]
    fn test_missing_label_fails_loudly() {
        let err = patch_address(TEMPLATE, "LoyaltyToken", addr(0x11)).unwrap_err();
        assert!(matches!(err, ArtifactError::PatternNotFound { label } if label == "LoyaltyToken"));
    }

    #[test]
    fn test_duplicate_assignment_is_ambiguous() {
        let content = format!("{TEMPLATE}const Backup = {{ GreenCoin: \"{}\" }};\n", addr(0x33));
        let err = patch_address(&content, "GreenCoin", addr(0x11)).unwrap_err();
        assert!(matches!(err, ArtifactError::AmbiguousPattern { count: 2, .. }));
    }

    #[test]
    fn test_label_suffix_does_not_match() {
        let content = format!("OldGreenCoin: \"{}\"\n", addr(0x33));
        let err = patch_address(&content, "GreenCoin", addr(0x11)).unwrap_err();
        assert!(matches!(err, ArtifactError::PatternNotFound { .. }));
    }

    #[test]
    fn test_rejects_non_identifier_labels() {
        let err = patch_address(TEMPLATE, "Green.Coin", addr(0x11)).unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidLabel { .. }));
    }
}
