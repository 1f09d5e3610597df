//! Control point bounds and advance of charstring outlines.
//!
//! `PathReader` implements the geometry of the drawing operators shared by Type1 and
//! Type2 charstrings. Arguments are always read from the bottom of the stack.

use pathfinder_geometry::rect::RectI;
use pathfinder_geometry::vector::{vec2i, Vector2I};

use super::{
    calc_subroutine_bias, CharStringError, Context, Machine, Operator, OperatorHandler,
    StackEffect, Subroutines,
};

/// Bounds of every on and off curve point of a path, in font units.
///
/// Starts out as the zero rectangle, so the origin is always included.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PathBounds {
    rect: RectI,
}

impl PathBounds {
    pub fn update(&mut self, pt: Vector2I) {
        self.rect = RectI::from_points(self.rect.origin().min(pt), self.rect.lower_right().max(pt));
    }

    pub fn union(&mut self, other: PathBounds) {
        self.update(other.rect.origin());
        self.update(other.rect.lower_right());
    }

    pub fn rect(&self) -> RectI {
        self.rect
    }

    pub fn x_min(&self) -> i32 {
        self.rect.min_x()
    }

    pub fn y_min(&self) -> i32 {
        self.rect.min_y()
    }

    pub fn x_max(&self) -> i32 {
        self.rect.max_x()
    }

    pub fn y_max(&self) -> i32 {
        self.rect.max_y()
    }
}

#[derive(Debug, Default, Clone)]
pub struct PathReader {
    pub bounds: PathBounds,
    current: Vector2I,
    is_path_open: bool,
    hstem_count: usize,
    vstem_count: usize,
    hintmask_size: usize,
    seen_hintmask: bool,
}

fn dx(x: i32) -> Vector2I {
    vec2i(x, 0)
}

fn dy(y: i32) -> Vector2I {
    vec2i(0, y)
}

fn d(x: i32, y: i32) -> Vector2I {
    vec2i(x, y)
}

impl PathReader {
    pub fn new() -> Self {
        PathReader::default()
    }

    pub fn current_point(&self) -> Vector2I {
        self.current
    }

    pub fn set_current_point(&mut self, pt: Vector2I) {
        self.current = pt;
    }

    pub fn hstem(&mut self, args: &[i32]) {
        self.hstem_count += args.len() / 2;
    }

    pub fn vstem(&mut self, args: &[i32]) {
        self.vstem_count += args.len() / 2;
    }

    /// Number of mask bytes following a hintmask or cntrmask operator. Arguments in
    /// front of the first mask are an implicit vstem.
    pub fn hintmask(&mut self, args: &[i32]) -> usize {
        if !self.seen_hintmask {
            self.vstem_count += args.len() / 2;
            self.hintmask_size = (self.hstem_count + self.vstem_count + 7) >> 3;
            self.seen_hintmask = true;
        }
        self.hintmask_size
    }

    pub fn close_path(&mut self) {
        self.is_path_open = false;
    }

    fn line(&mut self, pt: Vector2I) {
        if !self.is_path_open {
            self.is_path_open = true;
            self.bounds.update(self.current);
        }
        self.current = pt;
        self.bounds.update(pt);
    }

    pub(crate) fn curve(&mut self, pt1: Vector2I, pt2: Vector2I, pt3: Vector2I) {
        if !self.is_path_open {
            self.is_path_open = true;
            self.bounds.update(self.current);
        }
        self.bounds.update(pt1);
        self.bounds.update(pt2);
        self.current = pt3;
        self.bounds.update(pt3);
    }

    fn move_by(&mut self, delta: Vector2I) {
        self.current = self.current + delta;
        self.is_path_open = false;
    }

    pub fn rmoveto(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        match args {
            [.., x, y] => {
                self.move_by(d(*x, *y));
                Ok(())
            }
            _ => Err(CharStringError::StackUnderflow),
        }
    }

    pub fn hmoveto(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        let x = args.last().ok_or(CharStringError::StackUnderflow)?;
        self.move_by(dx(*x));
        Ok(())
    }

    pub fn vmoveto(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        let y = args.last().ok_or(CharStringError::StackUnderflow)?;
        self.move_by(dy(*y));
        Ok(())
    }

    pub fn rlineto(&mut self, args: &[i32]) {
        for pair in args.chunks_exact(2) {
            self.line(self.current + d(pair[0], pair[1]));
        }
    }

    /// Alternating horizontal and vertical lines, starting horizontal when `horizontal`.
    fn alternating_lines(&mut self, args: &[i32], mut horizontal: bool) {
        for &arg in args {
            let delta = if horizontal { dx(arg) } else { dy(arg) };
            self.line(self.current + delta);
            horizontal = !horizontal;
        }
    }

    pub fn hlineto(&mut self, args: &[i32]) {
        self.alternating_lines(args, true)
    }

    pub fn vlineto(&mut self, args: &[i32]) {
        self.alternating_lines(args, false)
    }

    pub fn rrcurveto(&mut self, args: &[i32]) {
        for c in args.chunks_exact(6) {
            let pt1 = self.current + d(c[0], c[1]);
            let pt2 = pt1 + d(c[2], c[3]);
            let pt3 = pt2 + d(c[4], c[5]);
            self.curve(pt1, pt2, pt3);
        }
    }

    pub fn hhcurveto(&mut self, args: &[i32]) {
        let (first_dy, rest) = match args.len() % 2 {
            1 => (args[0], &args[1..]),
            _ => (0, args),
        };
        let mut pt1 = self.current + dy(first_dy);
        for c in rest.chunks_exact(4) {
            pt1 = pt1 + dx(c[0]);
            let pt2 = pt1 + d(c[1], c[2]);
            let pt3 = pt2 + dx(c[3]);
            self.curve(pt1, pt2, pt3);
            pt1 = self.current;
        }
    }

    pub fn vvcurveto(&mut self, args: &[i32]) {
        let (first_dx, rest) = match args.len() % 2 {
            1 => (args[0], &args[1..]),
            _ => (0, args),
        };
        let mut pt1 = self.current + dx(first_dx);
        for c in rest.chunks_exact(4) {
            pt1 = pt1 + dy(c[0]);
            let pt2 = pt1 + d(c[1], c[2]);
            let pt3 = pt2 + dy(c[3]);
            self.curve(pt1, pt2, pt3);
            pt1 = self.current;
        }
    }

    /// Curves whose tangents alternate between horizontal and vertical. A trailing odd
    /// argument applies to the last end point along the other axis.
    fn alternating_curves(&mut self, args: &[i32], mut horizontal: bool) {
        let curves = args.len() / 4;
        for (i, c) in args.chunks_exact(4).enumerate() {
            let last = i + 1 == curves;
            let extra = if last && args.len() % 4 == 1 {
                args[args.len() - 1]
            } else {
                0
            };
            let (pt1, pt2, pt3);
            if horizontal {
                pt1 = self.current + dx(c[0]);
                pt2 = pt1 + d(c[1], c[2]);
                pt3 = pt2 + d(extra, c[3]);
            } else {
                pt1 = self.current + dy(c[0]);
                pt2 = pt1 + d(c[1], c[2]);
                pt3 = pt2 + d(c[3], extra);
            }
            self.curve(pt1, pt2, pt3);
            horizontal = !horizontal;
        }
    }

    pub fn hvcurveto(&mut self, args: &[i32]) {
        self.alternating_curves(args, true)
    }

    pub fn vhcurveto(&mut self, args: &[i32]) {
        self.alternating_curves(args, false)
    }

    pub fn rcurveline(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        if args.len() < 8 {
            return Err(CharStringError::InvalidOperand);
        }
        let (curves, line) = args.split_at(args.len() - 2);
        self.rrcurveto(curves);
        self.line(self.current + d(line[0], line[1]));
        Ok(())
    }

    pub fn rlinecurve(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        if args.len() < 8 {
            return Err(CharStringError::InvalidOperand);
        }
        let (lines, curve) = args.split_at(args.len() - 6);
        self.rlineto(lines);
        self.rrcurveto(curve);
        Ok(())
    }

    fn double_curve(&mut self, pts: [Vector2I; 6]) {
        self.curve(pts[0], pts[1], pts[2]);
        self.curve(pts[3], pts[4], pts[5]);
    }

    pub fn hflex(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        let a = match args {
            [_, _, _, _, _, _, _] => args,
            _ => return Err(CharStringError::InvalidOperand),
        };
        let pt1 = self.current + dx(a[0]);
        let pt2 = pt1 + d(a[1], a[2]);
        let pt3 = pt2 + dx(a[3]);
        let pt4 = pt3 + dx(a[4]);
        let pt5 = vec2i(pt4.x() + a[5], pt1.y());
        let pt6 = pt5 + dx(a[6]);
        self.double_curve([pt1, pt2, pt3, pt4, pt5, pt6]);
        Ok(())
    }

    pub fn flex(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        if args.len() != 13 {
            return Err(CharStringError::InvalidOperand);
        }
        let mut pts = [Vector2I::zero(); 6];
        let mut pt = self.current;
        for (i, pair) in args[..12].chunks_exact(2).enumerate() {
            pt = pt + d(pair[0], pair[1]);
            pts[i] = pt;
        }
        self.double_curve(pts);
        Ok(())
    }

    pub fn hflex1(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        if args.len() != 9 {
            return Err(CharStringError::InvalidOperand);
        }
        let a = args;
        let pt1 = self.current + d(a[0], a[1]);
        let pt2 = pt1 + d(a[2], a[3]);
        let pt3 = pt2 + dx(a[4]);
        let pt4 = pt3 + dx(a[5]);
        let pt5 = pt4 + d(a[6], a[7]);
        let pt6 = vec2i(pt5.x() + a[8], self.current.y());
        self.double_curve([pt1, pt2, pt3, pt4, pt5, pt6]);
        Ok(())
    }

    pub fn flex1(&mut self, args: &[i32]) -> Result<(), CharStringError> {
        if args.len() != 11 {
            return Err(CharStringError::InvalidOperand);
        }
        let mut pts = [Vector2I::zero(); 6];
        let mut pt = self.current;
        for (i, pair) in args[..10].chunks_exact(2).enumerate() {
            pt = pt + d(pair[0], pair[1]);
            pts[i] = pt;
        }
        let sum = pt - self.current;
        let last = args[10];
        pts[5] = if sum.x().abs() > sum.y().abs() {
            vec2i(pt.x() + last, self.current.y())
        } else {
            vec2i(self.current.x(), pt.y() + last)
        };
        self.double_curve(pts);
        Ok(())
    }
}

/// Advance and bounds recovered from a charstring.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct GlyphMetrics {
    pub advance: i32,
    pub bounds: PathBounds,
}

/// Type2 charstring handler collecting the glyph advance and control bounds.
pub struct Type2MetricsHandler {
    pub path: PathReader,
    pub width: i32,
    nominal_width: i32,
    width_parsed: bool,
}

impl Type2MetricsHandler {
    pub fn new(default_width: i32, nominal_width: i32) -> Self {
        Type2MetricsHandler {
            path: PathReader::new(),
            width: default_width,
            nominal_width,
            width_parsed: false,
        }
    }

    /// The width is an optional extra argument in front of the first stack clearing
    /// operator. Returns the arguments that remain for the operator itself.
    fn take_width<'b>(&mut self, args: &'b [i32], has_extra: bool) -> &'b [i32] {
        if self.width_parsed {
            return args;
        }
        self.width_parsed = true;
        match args {
            [width, rest @ ..] if has_extra => {
                self.width = self.nominal_width + width;
                rest
            }
            _ => args,
        }
    }
}

impl OperatorHandler for Type2MetricsHandler {
    fn context(&self) -> Context {
        Context::Type2Charstring
    }

    fn apply(
        &mut self,
        op: Operator,
        machine: &mut Machine<'_>,
    ) -> Result<StackEffect, CharStringError> {
        let all = machine.args.all();
        if op.escaped {
            match op.code {
                34 => self.path.hflex(all)?,
                35 => self.path.flex(all)?,
                36 => self.path.hflex1(all)?,
                37 => self.path.flex1(all)?,
                _ => return Err(CharStringError::InvalidOperator),
            }
            return Ok(StackEffect::Clear);
        }

        match op.code {
            // hstem, hstemhm
            1 | 18 => {
                let args = self.take_width(all, all.len() % 2 == 1);
                self.path.hstem(args);
            }
            // vstem, vstemhm
            3 | 23 => {
                let args = self.take_width(all, all.len() % 2 == 1);
                self.path.vstem(args);
            }
            // hintmask, cntrmask
            19 | 20 => {
                let args = self.take_width(all, all.len() % 2 == 1);
                let size = self.path.hintmask(args);
                machine.skip_bytes(size)?;
            }
            21 => {
                let args = self.take_width(all, all.len() > 2);
                self.path.rmoveto(args)?;
            }
            22 => {
                let args = self.take_width(all, all.len() > 1);
                self.path.hmoveto(args)?;
            }
            4 => {
                let args = self.take_width(all, all.len() > 1);
                self.path.vmoveto(args)?;
            }
            5 => self.path.rlineto(all),
            6 => self.path.hlineto(all),
            7 => self.path.vlineto(all),
            8 => self.path.rrcurveto(all),
            24 => self.path.rcurveline(all)?,
            25 => self.path.rlinecurve(all)?,
            26 => self.path.vvcurveto(all),
            27 => self.path.hhcurveto(all),
            30 => self.path.vhcurveto(all),
            31 => self.path.hvcurveto(all),
            10 | 29 => {
                let subrs = if op.code == 10 {
                    Subroutines::Local
                } else {
                    Subroutines::Global
                };
                let index = machine.args.pop()?;
                let bias = calc_subroutine_bias(machine.subroutine_count(subrs));
                machine.call_subroutine(index + bias, subrs)?;
                return Ok(StackEffect::Pop(0));
            }
            11 => {
                machine.return_from_subroutine()?;
                return Ok(StackEffect::Pop(0));
            }
            14 => {
                self.take_width(all, all.len() % 2 == 1);
                return Ok(StackEffect::Interrupt);
            }
            _ => return Err(CharStringError::InvalidOperator),
        }

        Ok(StackEffect::Clear)
    }
}

/// Run a Type2 charstring and return its advance and control bounds.
///
/// An empty charstring has no outline and no advance.
pub fn type2_glyph_metrics<'a>(
    charstring: &'a [u8],
    local_subrs: &'a [&'a [u8]],
    global_subrs: &'a [&'a [u8]],
    default_width: i32,
    nominal_width: i32,
) -> Result<GlyphMetrics, CharStringError> {
    if charstring.is_empty() {
        return Ok(GlyphMetrics::default());
    }
    let mut machine = Machine::new(local_subrs, global_subrs);
    let mut handler = Type2MetricsHandler::new(default_width, nominal_width);
    machine.run(charstring, &mut handler)?;
    Ok(GlyphMetrics {
        advance: handler.width,
        bounds: handler.path.bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> PathBounds {
        let mut bounds = PathBounds::default();
        bounds.update(vec2i(x_min, y_min));
        bounds.update(vec2i(x_max, y_max));
        bounds
    }

    // Encode small integers as single byte operands.
    fn n(value: i32) -> u8 {
        (value + 139) as u8
    }

    #[test]
    fn empty_charstring() {
        let metrics = type2_glyph_metrics(&[], &[], &[], 500, 0).unwrap();
        assert_eq!(metrics.advance, 0);
        assert_eq!(metrics.bounds, PathBounds::default());
    }

    #[test]
    fn square_with_width() {
        // 10 rmoveto with width, square of side 50, endchar
        let program = [
            n(20), n(10), n(10), 21, // width 20, move to (10, 10)
            n(50), 6, // hlineto
            n(50), 7, // vlineto
            n(-50), 6, n(-50), 7, 14,
        ];
        let metrics = type2_glyph_metrics(&program, &[], &[], 500, 400).unwrap();
        assert_eq!(metrics.advance, 420);
        // the origin is always part of the bounds
        assert_eq!(metrics.bounds, bounds(0, 0, 60, 60));
    }

    #[test]
    fn default_width() {
        let program = [n(10), n(10), 21, n(5), n(5), 5, 14];
        let metrics = type2_glyph_metrics(&program, &[], &[], 300, 400).unwrap();
        assert_eq!(metrics.advance, 300);
        assert_eq!(metrics.bounds, bounds(0, 0, 15, 15));
    }

    #[test]
    fn curve_includes_control_points() {
        let mut path = PathReader::new();
        path.rrcurveto(&[10, 80, 20, 0, 10, -80]);
        assert_eq!(path.bounds, bounds(0, 0, 40, 80));
        assert_eq!(path.current_point(), vec2i(40, 0));
    }

    #[test]
    fn odd_lineto_arguments() {
        let mut path = PathReader::new();
        path.hlineto(&[10, 20, 30]);
        assert_eq!(path.current_point(), vec2i(40, 20));
    }

    #[test]
    fn hvcurveto_trailing_argument() {
        let mut path = PathReader::new();
        path.hvcurveto(&[10, 10, 10, 10, 5]);
        assert_eq!(path.current_point(), vec2i(25, 20));
    }

    #[test]
    fn flex_argument_counts() {
        let mut path = PathReader::new();
        assert_eq!(path.flex(&[0; 12]), Err(CharStringError::InvalidOperand));
        assert_eq!(path.hflex(&[0; 6]), Err(CharStringError::InvalidOperand));
        assert!(path.flex1(&[1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 7]).is_ok());
        assert_eq!(path.current_point(), vec2i(12, 0));
    }

    #[test]
    fn hintmask_skips_mask_bytes() {
        // hstem with two stems, hintmask followed by one mask byte (0xFF would otherwise
        // be an operand prefix), then an empty endchar
        let program = [n(0), n(10), n(20), n(10), 1, n(0), n(5), 19, 0xFF, 14];
        let metrics = type2_glyph_metrics(&program, &[], &[], 0, 0).unwrap();
        assert_eq!(metrics.advance, 0);
    }

    #[test]
    fn biased_subroutine() {
        let subr: &[u8] = &[n(30), n(40), 5, 11];
        let locals = [subr];
        let program = [n(-107), 10, 14];
        let metrics = type2_glyph_metrics(&program, &locals, &[], 0, 0).unwrap();
        assert_eq!(metrics.bounds, bounds(0, 0, 30, 40));
    }

    #[test]
    fn invalid_operator() {
        assert_eq!(
            type2_glyph_metrics(&[2], &[], &[], 0, 0),
            Err(CharStringError::InvalidOperator)
        );
    }
}
