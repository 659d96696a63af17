//! Quantization profile catalog.
//!
//! The 14 llama.cpp quantization types AllQuants produces by default, ordered
//! from smallest/fastest to largest/highest quality. The order is the order in
//! which a default run quantizes them.

use serde::Serialize;

/// A named llama.cpp quantization type and its tradeoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantizationProfile {
    /// Type name passed to `llama-quantize` (e.g. "Q4_K_M")
    pub name: &'static str,
    pub description: &'static str,
    /// Relative file size category
    pub size: &'static str,
    /// Relative inference speed category
    pub speed: &'static str,
    /// Relative output quality category
    pub quality: &'static str,
    pub recommended_for: &'static str,
}

const fn profile(
    name: &'static str,
    description: &'static str,
    size: &'static str,
    speed: &'static str,
    quality: &'static str,
    recommended_for: &'static str,
) -> QuantizationProfile {
    QuantizationProfile {
        name,
        description,
        size,
        speed,
        quality,
        recommended_for,
    }
}

/// Full catalog of quantization profiles.
pub const QUANTIZATION_PROFILES: [QuantizationProfile; 14] = [
    profile("Q2_K", "Smallest size, fastest inference, lowest quality", "Smallest", "Fastest", "Low", "Prototyping, minimal RAM/CPU"),
    profile("Q3_K_S", "Very small size, very fast inference", "Very Small", "Very Fast", "Low-Med", "Lightweight devices, testing"),
    profile("Q3_K_M", "Small size, fast inference, medium quality", "Small", "Fast", "Med", "Lightweight, slightly better quality"),
    profile("Q3_K_L", "Small-medium size, fast inference", "Small-Med", "Fast", "Med", "Faster inference, fair quality"),
    profile("Q4_0", "Medium size, good quality", "Medium", "Fast", "Good", "General use, chats, low RAM"),
    profile("Q4_1", "Medium size, slightly better quality", "Medium", "Fast", "Good+", "Recommended, slightly better quality"),
    profile("Q4_K_S", "Medium size, balanced performance", "Medium", "Fast", "Good+", "Recommended, balanced"),
    profile("Q4_K_M", "Medium size, best Q4 option", "Medium", "Fast", "Good++", "Recommended, best Q4 option"),
    profile("Q5_0", "Larger size, very good quality", "Larger", "Moderate", "Very Good", "Chatbots, longer responses"),
    profile("Q5_1", "Larger size, very good+ quality", "Larger", "Moderate", "Very Good+", "More demanding tasks"),
    profile("Q5_K_S", "Larger size, advanced users", "Larger", "Moderate", "Very Good+", "Advanced users, better accuracy"),
    profile("Q5_K_M", "Larger size, excellent quality", "Larger", "Moderate", "Excellent", "Demanding tasks, high quality"),
    profile("Q6_K", "Large size, near FP16 quality", "Large", "Slower", "Near FP16", "Power users, best quantized quality"),
    profile("Q8_0", "Largest size, FP16-like quality", "Largest", "Slowest", "FP16-like", "Maximum quality, high RAM/CPU"),
];

/// All profiles in catalog order.
pub fn profiles() -> &'static [QuantizationProfile] {
    &QUANTIZATION_PROFILES
}

/// Profile names in catalog order.
pub fn profile_names() -> Vec<String> {
    QUANTIZATION_PROFILES
        .iter()
        .map(|p| p.name.to_string())
        .collect()
}

/// Look up a profile by name, ignoring case.
pub fn find_profile(name: &str) -> Option<&'static QuantizationProfile> {
    QUANTIZATION_PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_has_fourteen_unique_profiles() {
        assert_eq!(profiles().len(), 14);
        let names: HashSet<_> = profiles().iter().map(|p| p.name).collect();
        assert_eq!(names.len(), 14);
    }

    #[test]
    fn test_catalog_order() {
        let names = profile_names();
        assert_eq!(names.first().map(String::as_str), Some("Q2_K"));
        assert_eq!(names.last().map(String::as_str), Some("Q8_0"));
        let q4km = names.iter().position(|n| n == "Q4_K_M").unwrap();
        let q5_0 = names.iter().position(|n| n == "Q5_0").unwrap();
        assert!(q4km < q5_0);
    }

    #[test]
    fn test_find_profile_ignores_case() {
        let p = find_profile("q4_k_m").unwrap();
        assert_eq!(p.name, "Q4_K_M");
        assert_eq!(p.quality, "Good++");
        assert!(find_profile(" Q8_0 ").is_some());
        assert!(find_profile("IQ2_XXS").is_none());
    }
}
