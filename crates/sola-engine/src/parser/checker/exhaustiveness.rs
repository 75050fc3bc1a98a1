//! Exhaustiveness checking for `switch` over enums

use crate::parser::ast::{Expression, SwitchStmt};
use crate::parser::types::last_segment;

use super::symbols::SymbolTable;

/// Outcome of an exhaustiveness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExhaustivenessResult {
    Exhaustive,
    /// Members of the enum with no matching case, in declaration order
    Missing(Vec<String>),
}

/// Members named by the cases of `switch`, when each case is `Enum::Member`
fn covered_members<'s>(switch: &'s SwitchStmt, enum_name: &str) -> Vec<&'s str> {
    switch
        .cases
        .iter()
        .filter_map(|case| match &case.value {
            Expression::StaticProperty(sp)
                if last_segment(&sp.class) == last_segment(enum_name) =>
            {
                Some(sp.property.as_str())
            }
            _ => None,
        })
        .collect()
}

/// Check a switch whose subject has enum type `enum_name`.
///
/// A `default` branch always makes the switch exhaustive.
pub fn check_switch(switch: &SwitchStmt, enum_name: &str, symbols: &SymbolTable) -> ExhaustivenessResult {
    if switch.default.is_some() {
        return ExhaustivenessResult::Exhaustive;
    }
    let Some(members) = symbols.enum_members(enum_name) else {
        return ExhaustivenessResult::Exhaustive;
    };
    let covered = covered_members(switch, enum_name);
    let missing: Vec<String> = members
        .iter()
        .filter(|m| !covered.contains(&m.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        ExhaustivenessResult::Exhaustive
    } else {
        ExhaustivenessResult::Missing(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{Pos, StaticPropertyExpr, SwitchCase};

    fn pos() -> Pos {
        Pos::new("t.sola", 1, 1)
    }

    fn case(class: &str, member: &str) -> SwitchCase {
        SwitchCase {
            value: Expression::StaticProperty(StaticPropertyExpr {
                class: class.into(),
                property: member.into(),
                pos: pos(),
            }),
            body: vec![],
            pos: pos(),
        }
    }

    fn switch(cases: Vec<SwitchCase>) -> SwitchStmt {
        SwitchStmt {
            subject: Expression::var("c", pos()),
            cases,
            default: None,
            pos: pos(),
        }
    }

    fn symbols() -> SymbolTable {
        let mut s = SymbolTable::standalone();
        s.add_enum("Colour", vec!["Red".into(), "Green".into(), "Blue".into()]);
        s
    }

    #[test]
    fn test_missing_members_in_order() {
        let sw = switch(vec![case("Colour", "Red")]);
        assert_eq!(
            check_switch(&sw, "Colour", &symbols()),
            ExhaustivenessResult::Missing(vec!["Green".into(), "Blue".into()])
        );
    }

    #[test]
    fn test_all_members_covered() {
        let sw = switch(vec![
            case("Colour", "Blue"),
            case("App\\Colour", "Red"),
            case("Colour", "Green"),
        ]);
        assert_eq!(check_switch(&sw, "Colour", &symbols()), ExhaustivenessResult::Exhaustive);
    }

    #[test]
    fn test_default_is_exhaustive() {
        let mut sw = switch(vec![]);
        sw.default = Some(vec![]);
        assert_eq!(check_switch(&sw, "Colour", &symbols()), ExhaustivenessResult::Exhaustive);
    }
}
