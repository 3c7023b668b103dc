use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(255, 128), 128);
    assert_eq!(mul_div255_u16(0, 200), 0);
}

#[test]
fn frac01_wraps_into_unit_interval() {
    assert_eq!(frac01(0.0), 0.0);
    assert_eq!(frac01(1.0), 0.0);
    assert!((frac01(2.25) - 0.25).abs() < 1e-12);
    assert!((frac01(-0.25) - 0.75).abs() < 1e-12);
    let tiny = frac01(-1e-20);
    assert!((0.0..1.0).contains(&tiny));
}

#[test]
fn premultiply_zero_alpha_clears_color() {
    let mut px = vec![200u8, 100, 50, 0, 255, 0, 0, 128];
    premultiply_rgba8_in_place(&mut px);
    assert_eq!(px, vec![0, 0, 0, 0, 128, 0, 0, 128]);
}
