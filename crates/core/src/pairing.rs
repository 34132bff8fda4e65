#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome<L, R> {
    Paired(Vec<(L, R)>),
    CountMismatch { left: usize, right: usize },
}

pub fn zip_strict<L, R>(left: Vec<L>, right: Vec<R>) -> PairOutcome<L, R> {
    if left.len() != right.len() {
        return PairOutcome::CountMismatch {
            left: left.len(),
            right: right.len(),
        };
    }
    PairOutcome::Paired(left.into_iter().zip(right).collect())
}
