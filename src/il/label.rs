use std::fmt;

/// Opaque jump target
///
/// The host that supplies a method body hands out one of these for every branch target. Labels
/// carry no position of their own: an instruction is the target of a label when the label sits
/// in that instruction's label set.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct LabelId(pub usize);

impl LabelId {
    /// Get the next fresh label
    pub fn next(&self) -> LabelId {
        LabelId(self.0 + 1)
    }
}

/// Generates new labels
pub trait LabelGenerator<Label> {
    /// Generate a fresh label
    fn fresh_label(&mut self) -> Label;
}

/// Label generator for [`LabelId`]
///
/// Cloning does not split the generator source - the cloned generator will produce the same
/// sequence of labels as the original.
#[derive(Clone)]
pub struct LabelIdGenerator(LabelId);

impl LabelIdGenerator {
    pub fn new(start: LabelId) -> LabelIdGenerator {
        LabelIdGenerator(start)
    }

    /// Generator whose labels are all fresh with respect to `existing`
    pub fn after<'a>(existing: impl IntoIterator<Item = &'a LabelId>) -> LabelIdGenerator {
        let start = existing
            .into_iter()
            .max()
            .map_or(LabelId(0), |last| last.next());
        LabelIdGenerator(start)
    }
}

impl LabelGenerator<LabelId> for LabelIdGenerator {
    fn fresh_label(&mut self) -> LabelId {
        let to_return = self.0;
        self.0 = self.0.next();
        to_return
    }
}

impl fmt::Debug for LabelId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_fmt(format_args!("l{}", self.0))
    }
}
