use time::OffsetDateTime;

pub trait TimeProvider: Clone + Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}
