use crate::errors::Error;

/// Merge stage of an index entry
///
/// Stage 0 is the normal case; stages 1 to 3 hold the common ancestor, our
/// side and their side of an unresolved merge conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Normal,
    Ancestor,
    Ours,
    Theirs,
}

impl Stage {
    pub fn as_u16(&self) -> u16 {
        match self {
            Stage::Normal => 0,
            Stage::Ancestor => 1,
            Stage::Ours => 2,
            Stage::Theirs => 3,
        }
    }

    pub fn is_conflict(&self) -> bool {
        *self != Stage::Normal
    }
}

impl TryFrom<u32> for Stage {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Stage::Normal),
            1 => Ok(Stage::Ancestor),
            2 => Ok(Stage::Ours),
            3 => Ok(Stage::Theirs),
            other => Err(Error::InvalidStage(other)),
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Stage::Normal)]
    #[case(3, Stage::Theirs)]
    fn converts_from_integers(#[case] value: u32, #[case] expected: Stage) {
        assert_eq!(Stage::try_from(value).unwrap(), expected);
    }

    #[test]
    fn rejects_stages_past_theirs() {
        assert!(matches!(Stage::try_from(4), Err(Error::InvalidStage(4))));
    }

    #[test]
    fn orders_normal_first() {
        assert!(Stage::Normal < Stage::Ancestor);
        assert!(Stage::Ours < Stage::Theirs);
    }
}
