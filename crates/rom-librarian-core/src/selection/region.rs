use serde::{Deserialize, Serialize};
use std::path::Path;

/// Release region parsed from a No-Intro style filename tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Usa,
    Europe,
    Japan,
    World,
    Asia,
    Australia,
    Brazil,
    Canada,
    China,
    France,
    Germany,
    Italy,
    Korea,
    Spain,
}

impl Region {
    pub fn default_order() -> Vec<Region> {
        vec![Region::Usa, Region::Europe, Region::Japan, Region::World]
    }

    pub fn from_tag(tag: &str) -> Option<Region> {
        let region = match tag.trim().to_lowercase().as_str() {
            "usa" | "u" => Region::Usa,
            "europe" | "e" => Region::Europe,
            "japan" | "j" => Region::Japan,
            "world" | "w" => Region::World,
            "asia" => Region::Asia,
            "australia" | "a" => Region::Australia,
            "brazil" | "b" => Region::Brazil,
            "canada" => Region::Canada,
            "china" | "c" => Region::China,
            "france" | "f" => Region::France,
            "germany" | "g" => Region::Germany,
            "italy" | "i" => Region::Italy,
            "korea" | "k" => Region::Korea,
            "spain" | "s" => Region::Spain,
            _ => return None,
        };
        Some(region)
    }
}

/// Every region named in parenthesized tags of the file name, in order of appearance.
///
/// `Game (USA, Europe) (Rev 1).zip` yields `[Usa, Europe]`.
pub fn detect_regions(path: &Path) -> Vec<Region> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut regions = Vec::new();
    let mut rest = name.as_str();
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        for part in after[..close].split(',') {
            if let Some(region) = Region::from_tag(part) {
                if !regions.contains(&region) {
                    regions.push(region);
                }
            }
        }
        rest = &after[close + 1..];
    }
    regions
}

/// Position of the best detected region in `order`; `order.len()` when none is listed.
pub fn region_rank(path: &Path, order: &[Region]) -> usize {
    detect_regions(path)
        .iter()
        .filter_map(|region| order.iter().position(|r| r == region))
        .min()
        .unwrap_or(order.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_full_and_short_tags() {
        assert_eq!(detect_regions(Path::new("Game (USA).zip")), vec![Region::Usa]);
        assert_eq!(detect_regions(Path::new("Game (E).sfc")), vec![Region::Europe]);
        assert_eq!(detect_regions(Path::new("/roms/Game (J) [!].sfc")), vec![Region::Japan]);
    }

    #[test]
    fn test_detect_comma_list_and_ignores_other_tags() {
        assert_eq!(
            detect_regions(Path::new("Game (Rev 1) (USA, Europe) (En,Fr).zip")),
            vec![Region::Usa, Region::Europe]
        );
    }

    #[test]
    fn test_detect_nothing() {
        assert!(detect_regions(Path::new("Game.zip")).is_empty());
        assert!(detect_regions(Path::new("Game (Beta.zip")).is_empty());
    }

    #[test]
    fn test_rank_uses_best_region() {
        let order = Region::default_order();
        assert_eq!(region_rank(Path::new("Game (Japan, USA).zip"), &order), 0);
        assert_eq!(region_rank(Path::new("Game (World).zip"), &order), 3);
        assert_eq!(region_rank(Path::new("Game (Korea).zip"), &order), 4);
        assert_eq!(region_rank(Path::new("Game.zip"), &order), 4);
    }
}
