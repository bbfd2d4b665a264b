//! Product validation.
//!
//! Validation never fails the request: each problem becomes an issue on the
//! product, and the processor turns a non-empty issue list into a rejected
//! result.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CHANNEL_LIFECYCLE_STATES, ChannelFields, Product};

/// One validation problem on a product field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationIssue {
    pub path: String,
    pub code: String,
    pub message: String,
}

/// Accumulated issues for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn add(&mut self, path: &str, code: &str, message: &str) {
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    fn require_non_empty(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(path, "required", "field is required");
        }
    }
}

/// Checks the base field requirements every product must meet.
pub fn validate_product_base(p: &Product) -> ValidationResult {
    let mut res = ValidationResult::default();

    res.require_non_empty("product_key", &p.product_key);
    res.require_non_empty("title", &p.title);
    res.require_non_empty("description", &p.description);
    res.require_non_empty("link", &p.link);
    res.require_non_empty("image_link", &p.image_link);
    res.require_non_empty("condition", &p.condition);
    res.require_non_empty("availability", &p.availability);
    res.require_non_empty("price.amount_decimal", &p.price.amount_decimal);
    res.require_non_empty("price.currency", &p.price.currency);

    if !p.price.amount_decimal.is_empty() && !looks_like_decimal(&p.price.amount_decimal) {
        res.add(
            "price.amount_decimal",
            "invalid_decimal",
            "amount_decimal must look like a decimal number (e.g. \"19.99\")",
        );
    }
    if !p.price.currency.is_empty() && p.price.currency.chars().count() != 3 {
        res.add(
            "price.currency",
            "invalid_currency",
            "currency must be a 3-letter ISO code (e.g. \"USD\")",
        );
    }

    res
}

/// Checks control state for every channel the caller has enabled.
///
/// A channel enabled at feed level but absent from the product is an issue;
/// so is a state outside the recognised lifecycle set. An enabled name this
/// service version does not recognise gets an `unknown_channel` issue.
pub fn validate_channel_controls(p: &Product, enabled_channels: &[String]) -> ValidationResult {
    let mut res = ValidationResult::default();

    let mut enabled: Vec<String> = enabled_channels
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    enabled.sort();
    enabled.dedup();

    for name in &enabled {
        if !ChannelFields::is_recognised(name) {
            res.add(
                &format!("channel.{name}"),
                "unknown_channel",
                "channel is enabled but not recognized by this service version",
            );
            continue;
        }

        let Some(block) = p.channel.get(name) else {
            res.add(
                &format!("channel.{name}"),
                "missing_channel_block",
                &format!("{name} channel block is required because {name} is enabled for this feed"),
            );
            continue;
        };

        if !CHANNEL_LIFECYCLE_STATES.contains(&block.control.state.as_str()) {
            res.add(
                &format!("channel.{name}.control.state"),
                "invalid_state",
                "state must be one of: active, inactive, delete",
            );
        }
    }

    res
}

fn looks_like_decimal(v: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;

    for c in v.chars() {
        match c {
            '.' => {
                dots += 1;
                if dots > 1 {
                    return false;
                }
            }
            '0'..='9' => digits += 1,
            _ => return false,
        }
    }

    digits > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelBlock, ChannelControl, Money};

    fn valid_product() -> Product {
        Product {
            product_key: "sku1".to_string(),
            title: "Test".to_string(),
            description: "Desc".to_string(),
            link: "https://example.com/p/sku1".to_string(),
            image_link: "https://example.com/p/sku1.jpg".to_string(),
            condition: "new".to_string(),
            availability: "in_stock".to_string(),
            price: Money {
                amount_decimal: "19.99".to_string(),
                currency: "USD".to_string(),
            },
            ..Default::default()
        }
    }

    fn with_google_state(state: &str) -> Product {
        let mut p = valid_product();
        p.channel.google = Some(ChannelBlock {
            control: ChannelControl {
                state: state.to_string(),
            },
        });
        p
    }

    fn paths(res: &ValidationResult) -> Vec<&str> {
        res.issues.iter().map(|i| i.path.as_str()).collect()
    }

    #[test]
    fn valid_product_passes_base() {
        assert!(validate_product_base(&valid_product()).is_valid());
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let res = validate_product_base(&Product::default());
        let got = paths(&res);
        for expected in [
            "product_key",
            "title",
            "description",
            "link",
            "image_link",
            "condition",
            "availability",
            "price.amount_decimal",
            "price.currency",
        ] {
            assert!(got.contains(&expected), "missing issue for {expected}");
        }
    }

    #[test]
    fn whitespace_only_field_is_missing() {
        let mut p = valid_product();
        p.title = "   ".to_string();
        let res = validate_product_base(&p);
        assert_eq!(paths(&res), vec!["title"]);
        assert_eq!(res.issues[0].code, "required");
    }

    #[test]
    fn decimal_shapes() {
        for ok in ["0", "19.99", "100", "0.5"] {
            let mut p = valid_product();
            p.price.amount_decimal = ok.to_string();
            assert!(validate_product_base(&p).is_valid(), "{ok} should pass");
        }
        for bad in ["19,99", "19.9.9", ".", "-5", "19.99 USD", "1e3"] {
            let mut p = valid_product();
            p.price.amount_decimal = bad.to_string();
            let res = validate_product_base(&p);
            assert_eq!(res.issues[0].code, "invalid_decimal", "{bad} should fail");
        }
    }

    #[test]
    fn currency_must_be_three_chars() {
        let mut p = valid_product();
        p.price.currency = "USDT".to_string();
        let res = validate_product_base(&p);
        assert_eq!(res.issues[0].code, "invalid_currency");
    }

    #[test]
    fn enabled_channel_requires_block() {
        let res = validate_channel_controls(&valid_product(), &["google".to_string()]);
        assert_eq!(paths(&res), vec!["channel.google"]);
        assert_eq!(res.issues[0].code, "missing_channel_block");
    }

    #[test]
    fn lifecycle_states_accepted() {
        for state in ["active", "inactive", "delete"] {
            let p = with_google_state(state);
            assert!(
                validate_channel_controls(&p, &["google".to_string()]).is_valid(),
                "{state} should pass"
            );
        }
    }

    #[test]
    fn invalid_state_is_reported() {
        let p = with_google_state("archived");
        let res = validate_channel_controls(&p, &["google".to_string()]);
        assert_eq!(paths(&res), vec!["channel.google.control.state"]);
        assert_eq!(res.issues[0].code, "invalid_state");
    }

    #[test]
    fn unrecognised_enabled_channel_is_flagged() {
        let p = with_google_state("active");
        let res = validate_channel_controls(&p, &["google".to_string(), "tiktok".to_string()]);
        assert_eq!(paths(&res), vec!["channel.tiktok"]);
        assert_eq!(res.issues[0].code, "unknown_channel");
    }

    #[test]
    fn enabled_names_are_trimmed_and_lowercased() {
        let p = with_google_state("active");
        let res = validate_channel_controls(&p, &[" Google ".to_string()]);
        assert!(res.is_valid());
    }

    #[test]
    fn no_enabled_channels_no_issues() {
        assert!(validate_channel_controls(&valid_product(), &[]).is_valid());
    }
}
