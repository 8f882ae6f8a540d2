//! Electrical quantities in the resolution of USB PD.
//!
//! The base units are chosen such that potential is stored in millivolts, current in
//! milliamperes and power in microwatts. Power data objects convert without loss.

ISQ!(uom::si, u32, (meter, milligram, second, milliampere, kelvin, mole, candela));

#[cfg(test)]
mod tests {
    use uom::si::electric_current::{ampere, milliampere};
    use uom::si::electric_potential::millivolt;
    use uom::si::power::milliwatt;

    use super::*;

    #[test]
    fn milli_units_are_exact() {
        assert_eq!(ElectricCurrent::new::<milliampere>(500).get::<milliampere>(), 500);
        assert_eq!(ElectricCurrent::new::<ampere>(3).get::<milliampere>(), 3000);
        assert_eq!(ElectricPotential::new::<millivolt>(5050).get::<millivolt>(), 5050);
        assert_eq!(Power::new::<milliwatt>(250).get::<milliwatt>(), 250);
    }

    #[test]
    fn comparison_below_one_ampere() {
        assert!(ElectricCurrent::new::<milliampere>(1500) < ElectricCurrent::new::<milliampere>(1900));
    }
}
