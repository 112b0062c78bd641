//! 类别标签表

use crate::utils::error::ClassifyError;
use crate::Result;
use std::path::Path;

/// 预测索引不在标签表中时使用的标签
pub const UNKNOWN_LABEL: &str = "Unknown";

/// 训练模型使用的 75 种蝴蝶类别，顺序即类别索引
pub const BUTTERFLY_NAMES: [&str; 75] = [
    "ADONIS",
    "AFRICAN GIANT SWALLOWTAIL",
    "AMERICAN SNOOT",
    "AN 88",
    "APPOLLO",
    "ATALA",
    "BANDED ORANGE HELICONIAN",
    "BANDED PEACOCK",
    "BECKERS WHITE",
    "BLACK HAIRSTREAK",
    "BLUE MORPHO",
    "BLUE SPOTTED CROW",
    "BROWN SIPROETA",
    "CABBAGE WHITE",
    "CAIRNS BIRDWING",
    "CHECQUERED SKIPPER",
    "CHESTNUT",
    "CLEOPATRA",
    "CLODIUS PARNASSIAN",
    "CLOUDED SULPHUR",
    "COMMON BANDED AWL",
    "COMMON WOOD-NYMPH",
    "COPPER TAIL",
    "CRECENT",
    "CRIMSON PATCH",
    "DANAID EGGFLY",
    "EASTERN COMA",
    "EASTERN DAPPLE WHITE",
    "EASTERN PINE ELFIN",
    "ELBOWED PIERROT",
    "GOLD BANDED",
    "GREAT EGGFLY",
    "GREAT JAY",
    "GREEN CELLED CATTLEHEART",
    "GREY HAIRSTREAK",
    "INDRA SWALLOW",
    "IPHICLUS SISTER",
    "JULIA",
    "LARGE MARBLE",
    "MALACHITE",
    "MANGROVE SKIPPER",
    "MESTRA",
    "METALMARK",
    "MILBERTS TORTOISESHELL",
    "MONARCH",
    "MOURNING CLOAK",
    "ORANGE OAKLEAF",
    "ORANGE TIP",
    "ORCHARD SWALLOW",
    "PAINTED LADY",
    "PAPER KITE",
    "PEACOCK",
    "PINE WHITE",
    "PIPEVINE SWALLOW",
    "POPINJAY",
    "PURPLE HAIRSTREAK",
    "PURPLISH COPPER",
    "QUESTION MARK",
    "RED ADMIRAL",
    "RED CRACKER",
    "RED POSTMAN",
    "RED SPOTTED PURPLE",
    "SCARCE SWALLOW",
    "SILVER SPOT SKIPPER",
    "SLEEPY ORANGE",
    "SOOTYWING",
    "SOUTHERN DOGFACE",
    "STRAITED QUEEN",
    "TROPICAL LEAFWING",
    "TWO BARRED FLASHER",
    "ULYSES",
    "VICEROY",
    "WOOD SATYR",
    "YELLOW SWALLOW TAIL",
    "ZEBRA LONG WING",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn butterflies() -> Self {
        Self::from_labels(BUTTERFLY_NAMES)
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// 从文本文件读取，每行一个标签，空行忽略
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::Config(format!(
                "Failed to read label file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let table = Self::from_labels(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        );

        if table.is_empty() {
            return Err(ClassifyError::Config(format!(
                "Label file '{}' contains no labels",
                path.display()
            )));
        }

        Ok(table)
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn resolve(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self::butterflies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn butterfly_table_is_dense() {
        let table = LabelTable::butterflies();
        assert_eq!(table.len(), 75);
        assert_eq!(table.get(0), Some("ADONIS"));
        assert_eq!(table.get(44), Some("MONARCH"));
        assert_eq!(table.get(74), Some("ZEBRA LONG WING"));
        assert_eq!(table.get(75), None);
    }

    #[test]
    fn resolve_falls_back_to_unknown() {
        let table = LabelTable::from_labels(["A", "B", "C"]);
        assert_eq!(table.resolve(1), "B");
        assert_eq!(table.resolve(3), UNKNOWN_LABEL);
        assert_eq!(table.resolve(usize::MAX), UNKNOWN_LABEL);
    }

    #[test]
    fn reads_label_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cat").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  dog  ").unwrap();

        let table = LabelTable::from_path(file.path()).unwrap();
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["cat", "dog"]);
    }

    #[test]
    fn empty_or_missing_label_file() {
        let file = NamedTempFile::new().unwrap();
        assert!(LabelTable::from_path(file.path()).is_err());
        assert!(LabelTable::from_path(Path::new("/nonexistent/labels.txt")).is_err());
    }
}
