use lockstep_math::fixed::Fp;
use proptest::prelude::*;

proptest! {
    #[test]
    fn to_float_round_trips_within_one_lsb(x in -1_000_000.0f64..1_000_000.0) {
        let fp = Fp::to_fixed(x);
        let back = fp.to_float();
        prop_assert!((back - x).abs() <= 2f64.powi(-16) * 2.0 + 1e-9);
    }

    #[test]
    fn mul_is_commutative(a in any::<i32>(), b in any::<i32>()) {
        let fa = Fp::from_raw(a);
        let fb = Fp::from_raw(b);
        prop_assert_eq!(fa.mul(fb), fb.mul(fa));
    }

    #[test]
    fn add_sub_round_trips(a in any::<i32>(), b in any::<i32>()) {
        let fa = Fp::from_raw(a);
        let fb = Fp::from_raw(b);
        prop_assert_eq!((fa + fb) - fb, fa);
    }
}
