use crate::Label;
use std::collections::HashSet;

/// Generates fresh labels for one function.
///
/// Labels already used by the function must be [`reserve`](NameGenerator::reserve)d first. A
/// leading `.` is ignored when comparing names, so `.L0` and `L0` are considered the same.
#[derive(Debug, Clone, Default)]
pub struct NameGenerator {
    next_label: u32,
    taken: HashSet<String>,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.trim_start_matches('.').to_owned());
    }

    pub fn next_label(&mut self) -> Label {
        loop {
            let name = format!("L{}", self.next_label);
            self.next_label += 1;
            if self.taken.insert(name.clone()) {
                return Label::from(format!(".{name}"));
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skips_reserved_labels() {
        let mut names = NameGenerator::new();
        names.reserve("L1");
        names.reserve(".L2");
        assert_eq!(Label::from(".L0"), names.next_label());
        assert_eq!(Label::from(".L3"), names.next_label());
        assert_eq!(Label::from(".L4"), names.next_label());
    }
}
