use clap::ValueEnum;
use passline_engine::{BonusType, ExamType};

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum ExamTypeFlag {
    Public,
    Career,
}

impl ExamTypeFlag {
    pub(crate) const fn as_domain(self) -> ExamType {
        match self {
            ExamTypeFlag::Public => ExamType::Public,
            ExamTypeFlag::Career => ExamType::Career,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum BonusTypeFlag {
    None,
    Veteran10,
    Veteran5,
    Hero5,
    Hero3,
}

impl BonusTypeFlag {
    pub(crate) const fn as_domain(self) -> BonusType {
        match self {
            BonusTypeFlag::None => BonusType::None,
            BonusTypeFlag::Veteran10 => BonusType::Veteran10,
            BonusTypeFlag::Veteran5 => BonusType::Veteran5,
            BonusTypeFlag::Hero5 => BonusType::Hero5,
            BonusTypeFlag::Hero3 => BonusType::Hero3,
        }
    }
}
