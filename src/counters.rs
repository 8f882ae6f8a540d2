//! Definition of counters, used for retry attempts, debouncing, and message IDs.

/// Number of consecutive identical CC samples that must be exceeded before an attach decision.
pub const N_DEBOUNCE_CNT: u8 = 10;
/// Maximum number of source capability transmissions before giving up.
pub const N_CAPS_COUNT: u8 = 50;
/// Maximum number of hard resets per connection.
pub const N_HARDRESET_COUNT: u8 = 3;

/// Counter errors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The counter wrapped around.
    Overrun,
}

/// A bounded counter that wraps around after its maximum value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Counter {
    value: u8,
    max_value: u8,
}

/// Kinds of counters and their bounds.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterType {
    /// Source capabilities transmissions.
    Caps,
    /// Identical consecutive CC samples.
    Debounce,
    /// Hard resets. Can hold one more than the limit, which marks the limit as exceeded.
    HardReset,
    /// The 3 bit rolling message ID.
    MessageId,
}

impl Counter {
    /// Create a new counter of a given type, starting at zero.
    pub fn new(counter_type: CounterType) -> Self {
        let max_value = match counter_type {
            CounterType::Caps => N_CAPS_COUNT,
            CounterType::Debounce => N_DEBOUNCE_CNT + 1,
            CounterType::HardReset => N_HARDRESET_COUNT + 1,
            CounterType::MessageId => 7,
        };

        Self { value: 0, max_value }
    }

    /// Create a new counter with a given start value.
    pub fn new_from_value(counter_type: CounterType, value: u8) -> Self {
        let mut counter = Self::new(counter_type);
        counter.set(value);
        counter
    }

    /// Set the counter value, wrapping around the maximum.
    pub fn set(&mut self, value: u8) {
        self.value = value % (self.max_value + 1);
    }

    /// The current value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Increment the counter, reporting an overrun when it wraps to zero.
    pub fn increment(&mut self) -> Result<(), Error> {
        self.set(self.value + 1);

        if self.value == 0 {
            Err(Error::Overrun)
        } else {
            Ok(())
        }
    }

    /// Reset to zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_wraps_after_seven() {
        let mut counter = Counter::new_from_value(CounterType::MessageId, 6);

        assert!(counter.increment().is_ok());
        assert_eq!(counter.value(), 7);

        assert_eq!(counter.increment(), Err(Error::Overrun));
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn hard_reset_counter_can_mark_exceeded() {
        let counter = Counter::new_from_value(CounterType::HardReset, N_HARDRESET_COUNT + 1);
        assert!(counter.value() > N_HARDRESET_COUNT);
    }

    #[test]
    fn debounce_counter_reaches_threshold() {
        let mut counter = Counter::new(CounterType::Debounce);

        for _ in 0..N_DEBOUNCE_CNT {
            counter.increment().unwrap();
            assert!(counter.value() <= N_DEBOUNCE_CNT);
        }

        counter.increment().unwrap();
        assert!(counter.value() > N_DEBOUNCE_CNT);
    }
}
