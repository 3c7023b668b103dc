use kurbo::Shape;

use super::*;

#[test]
fn icons_fit_the_unit_box() {
    for path in [heart_path(), lightning_path()] {
        let bb = path.bounding_box();
        assert!(bb.x0 >= 0.0 && bb.y0 >= 0.0, "{bb:?}");
        assert!(bb.x1 <= 1.0 && bb.y1 <= 1.0, "{bb:?}");
        assert!(bb.area() > 0.5);
    }
}

#[test]
fn icons_are_closed() {
    for path in [heart_path(), lightning_path()] {
        assert!(matches!(
            path.elements().last(),
            Some(kurbo::PathEl::ClosePath)
        ));
    }
}
