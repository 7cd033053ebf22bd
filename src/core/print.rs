use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Where the image lands on the printable area, in page units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintPlacement {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl PrintJob {
    /// Scales the image to fit the page, keeping aspect ratio, and centres it.
    /// Images smaller than the page are enlarged to fit as well.
    pub fn placement(&self, page_width: f64, page_height: f64) -> PrintPlacement {
        fit_to_page(
            f64::from(self.width),
            f64::from(self.height),
            page_width,
            page_height,
        )
    }
}

pub fn fit_to_page(
    image_width: f64,
    image_height: f64,
    page_width: f64,
    page_height: f64,
) -> PrintPlacement {
    if image_width <= 0.0 || image_height <= 0.0 || page_width <= 0.0 || page_height <= 0.0 {
        return PrintPlacement {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        };
    }

    let scale = (page_width / image_width).min(page_height / image_height);
    PrintPlacement {
        x: (page_width - image_width * scale) / 2.0,
        y: (page_height - image_height * scale) / 2.0,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(left: f64, right: f64) {
        assert!((left - right).abs() < 1e-9, "{left} != {right}");
    }

    #[test]
    fn wide_image_fills_page_width_and_centres_vertically() {
        let placement = fit_to_page(2000.0, 1000.0, 500.0, 800.0);
        assert_close(placement.scale, 0.25);
        assert_close(placement.x, 0.0);
        assert_close(placement.y, (800.0 - 250.0) / 2.0);
    }

    #[test]
    fn tall_image_fills_page_height_and_centres_horizontally() {
        let placement = fit_to_page(100.0, 400.0, 600.0, 800.0);
        assert_close(placement.scale, 2.0);
        assert_close(placement.x, (600.0 - 200.0) / 2.0);
        assert_close(placement.y, 0.0);
    }

    #[test]
    fn degenerate_sizes_leave_image_unscaled() {
        let job = PrintJob {
            image_path: PathBuf::from("/tmp/x.png"),
            width: 0,
            height: 10,
        };
        assert_eq!(
            job.placement(100.0, 100.0),
            PrintPlacement {
                x: 0.0,
                y: 0.0,
                scale: 1.0
            }
        );
    }
}
