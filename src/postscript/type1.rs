//! Type1 charstring operators.
//!
//! Only what is needed for advances and control bounds is implemented. Hints are counted
//! and otherwise ignored. Of the OtherSubrs only the flex mechanism (0, 1 and 2) is
//! understood.

use pathfinder_geometry::vector::{vec2i, Vector2I};

use super::bounds::{GlyphMetrics, PathReader};
use super::{CharStringError, Context, Machine, Operator, OperatorHandler, StackEffect, Subroutines};

/// Arguments of the `seac` operator: an accented glyph built from two glyphs of the
/// Standard Encoding.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Seac {
    pub accent_left_side_bearing: i32,
    pub accent_origin: Vector2I,
    pub base_code: i32,
    pub accent_code: i32,
}

#[derive(Debug, Default)]
pub struct Type1MetricsHandler {
    pub path: PathReader,
    pub left_bearing: Vector2I,
    pub advance: Vector2I,
    pub seac: Option<Seac>,
    flex_points: Vec<Vector2I>,
    in_flex: bool,
}

impl Type1MetricsHandler {
    pub fn new() -> Self {
        Type1MetricsHandler::default()
    }

    /// Start drawing from `origin` rather than (0, 0). Used for the accent of a `seac`.
    pub fn with_origin(origin: Vector2I) -> Self {
        let mut handler = Type1MetricsHandler::default();
        handler.left_bearing = origin;
        handler.path.set_current_point(origin);
        handler
    }

    fn relative_curve(&mut self, d1: Vector2I, d2: Vector2I, d3: Vector2I) {
        let pt1 = self.path.current_point() + d1;
        let pt2 = pt1 + d2;
        let pt3 = pt2 + d3;
        self.path.curve(pt1, pt2, pt3);
    }

    fn end_flex(&mut self) -> Result<(), CharStringError> {
        self.in_flex = false;
        if self.flex_points.len() < 7 {
            return Err(CharStringError::InvalidOperand);
        }
        let current = self.path.current_point();
        // the reference point is relative to the start point, the first control point
        // to the reference point
        let reference = self.flex_points[0] + current;
        let first = self.flex_points[1] + reference - current;
        let pts = [
            first,
            self.flex_points[2],
            self.flex_points[3],
            self.flex_points[4],
            self.flex_points[5],
            self.flex_points[6],
        ];
        self.relative_curve(pts[0], pts[1], pts[2]);
        self.relative_curve(pts[3], pts[4], pts[5]);
        self.flex_points.clear();
        Ok(())
    }

    fn call_other_subr(&mut self, machine: &mut Machine<'_>) -> Result<(), CharStringError> {
        let index = machine.args.pop()?;
        let arg_count = machine.args.pop()?;
        let arg_count = usize::try_from(arg_count).map_err(|_| CharStringError::InvalidOperand)?;
        machine.args.pop_n(arg_count)?;

        match index {
            0 => {
                if arg_count != 3 {
                    return Err(CharStringError::InvalidOperand);
                }
                self.end_flex()?;
                // Leave the end point where two following `pop` operators find it.
                let current = self.path.current_point();
                machine.args.push(current.x())?;
                machine.args.push(current.y())?;
                machine.args.pop_n(2)?;
            }
            1 => {
                if arg_count != 0 {
                    return Err(CharStringError::InvalidOperand);
                }
                self.in_flex = true;
                self.flex_points.clear();
            }
            2 => {
                if arg_count != 0 {
                    return Err(CharStringError::InvalidOperand);
                }
                // points are collected by the moveto operators
            }
            _ => {}
        }
        Ok(())
    }
}

impl OperatorHandler for Type1MetricsHandler {
    fn context(&self) -> Context {
        Context::Type1Charstring
    }

    fn apply(
        &mut self,
        op: Operator,
        machine: &mut Machine<'_>,
    ) -> Result<StackEffect, CharStringError> {
        let args = machine.args.all();
        if !op.escaped {
            match op.code {
                1 => self.path.hstem(args),
                3 => self.path.vstem(args),
                4 if self.in_flex => {
                    let y = *args.last().ok_or(CharStringError::StackUnderflow)?;
                    self.flex_points.push(vec2i(0, y));
                }
                4 => self.path.vmoveto(args)?,
                5 => self.path.rlineto(args),
                6 => self.path.hlineto(args),
                7 => self.path.vlineto(args),
                8 => self.path.rrcurveto(args),
                9 => self.path.close_path(),
                10 => {
                    let index = machine.args.pop()?;
                    machine.call_subroutine(index, Subroutines::Local)?;
                    return Ok(StackEffect::Pop(0));
                }
                11 => {
                    machine.return_from_subroutine()?;
                    return Ok(StackEffect::Pop(0));
                }
                // hsbw
                13 => match args {
                    [.., sbx, wx] => {
                        self.left_bearing = vec2i(self.left_bearing.x() + sbx, self.left_bearing.y());
                        self.advance = vec2i(*wx, 0);
                        // sets the current point without placing it in the path
                        self.path.set_current_point(self.left_bearing);
                    }
                    _ => return Err(CharStringError::StackUnderflow),
                },
                14 => return Ok(StackEffect::Interrupt),
                21 if self.in_flex => match args {
                    [.., x, y] => self.flex_points.push(vec2i(*x, *y)),
                    _ => return Err(CharStringError::StackUnderflow),
                },
                21 => self.path.rmoveto(args)?,
                22 if self.in_flex => {
                    let x = *args.last().ok_or(CharStringError::StackUnderflow)?;
                    self.flex_points.push(vec2i(x, 0));
                }
                22 => self.path.hmoveto(args)?,
                30 => self.path.vhcurveto(args),
                31 => self.path.hvcurveto(args),
                _ => return Err(CharStringError::InvalidOperator),
            }
        } else {
            match op.code {
                // dotsection
                0 => {}
                // vstem3, hstem3
                1 => self.path.vstem(args),
                2 => self.path.hstem(args),
                6 => match args {
                    [.., asb, adx, ady, bchar, achar] => {
                        self.seac = Some(Seac {
                            accent_left_side_bearing: *asb,
                            accent_origin: vec2i(*adx, *ady),
                            base_code: *bchar,
                            accent_code: *achar,
                        });
                        return Ok(StackEffect::Interrupt);
                    }
                    _ => return Err(CharStringError::StackUnderflow),
                },
                // sbw
                7 => match args {
                    [.., sbx, sby, wx, wy] => {
                        self.left_bearing = self.left_bearing + vec2i(*sbx, *sby);
                        self.advance = vec2i(*wx, *wy);
                        self.path.set_current_point(self.left_bearing);
                    }
                    _ => return Err(CharStringError::StackUnderflow),
                },
                16 => {
                    self.call_other_subr(machine)?;
                    return Ok(StackEffect::Pop(0));
                }
                // pop: brings back a value left by callothersubr
                17 => {
                    machine.args.unpop(1)?;
                    return Ok(StackEffect::Pop(0));
                }
                // setcurrentpoint
                33 => match args {
                    [.., x, y] => self.path.set_current_point(vec2i(*x, *y)),
                    _ => return Err(CharStringError::StackUnderflow),
                },
                _ => return Err(CharStringError::InvalidOperator),
            }
        }
        Ok(StackEffect::Clear)
    }
}

/// Result of running a Type1 charstring.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Type1Glyph {
    pub metrics: GlyphMetrics,
    pub left_bearing: Vector2I,
    /// Set when the glyph is composed with `seac`.
    pub seac: Option<Seac>,
}

pub fn type1_glyph_metrics<'a>(
    charstring: &'a [u8],
    subrs: &'a [&'a [u8]],
    origin: Vector2I,
) -> Result<Type1Glyph, CharStringError> {
    if charstring.is_empty() {
        return Ok(Type1Glyph::default());
    }
    let mut machine = Machine::new(subrs, &[]);
    let mut handler = Type1MetricsHandler::with_origin(origin);
    machine.run(charstring, &mut handler)?;
    Ok(Type1Glyph {
        metrics: GlyphMetrics {
            advance: handler.advance.x(),
            bounds: handler.path.bounds,
        },
        left_bearing: handler.left_bearing,
        seac: handler.seac,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postscript::bounds::PathBounds;

    fn n(value: i32) -> u8 {
        (value + 139) as u8
    }

    fn bounds(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> PathBounds {
        let mut bounds = PathBounds::default();
        bounds.update(vec2i(x_min, y_min));
        bounds.update(vec2i(x_max, y_max));
        bounds
    }

    #[test]
    fn hsbw_sets_advance_and_current_point() {
        let program = [n(20), 247, 0, 13, n(30), 6, 9, 14]; // 20 108 hsbw 30 hlineto
        let glyph = type1_glyph_metrics(&program, &[], Vector2I::zero()).unwrap();
        assert_eq!(glyph.metrics.advance, 108);
        assert_eq!(glyph.left_bearing, vec2i(20, 0));
        assert_eq!(glyph.metrics.bounds, bounds(0, 0, 50, 0));
    }

    #[test]
    fn callsubr_is_not_biased() {
        let subr: &[u8] = &[n(0), n(40), 5, 11];
        let subrs = [subr];
        let program = [n(0), n(100), 13, n(0), 10, 14];
        let glyph = type1_glyph_metrics(&program, &subrs, Vector2I::zero()).unwrap();
        assert_eq!(glyph.metrics.bounds, bounds(0, 0, 0, 40));
    }

    #[test]
    fn flex() {
        // hsbw, start flex, seven rmoveto points each followed by othersubr 2, end flex
        let mut program = vec![n(0), n(100), 13];
        program.extend_from_slice(&[n(0), n(1), 12, 16]); // 0 1 callothersubr
        let points = [(10, 0), (0, 10), (10, 0), (10, -10), (10, 10), (10, 0), (0, -10)];
        for (x, y) in points {
            program.extend_from_slice(&[n(x), n(y), 21, n(0), n(2), 12, 16]);
        }
        // 50 x y 3 0 callothersubr pop pop setcurrentpoint
        program.extend_from_slice(&[n(50), n(40), n(0), n(3), n(0), 12, 16]);
        program.extend_from_slice(&[12, 17, 12, 17, 12, 33, 14]);

        let glyph = type1_glyph_metrics(&program, &[], Vector2I::zero()).unwrap();
        // reference (10, 0); control points (10, 10), (20, 10) -> (30, 0), then
        // (40, 10), (50, 10) -> (50, 0)
        assert_eq!(glyph.metrics.bounds, bounds(0, 0, 50, 10));
    }

    #[test]
    fn seac() {
        let program = [n(0), n(100), 13, n(10), n(20), n(30), n(65), n(-74), 12, 6];
        let glyph = type1_glyph_metrics(&program, &[], Vector2I::zero()).unwrap();
        assert_eq!(
            glyph.seac,
            Some(Seac {
                accent_left_side_bearing: 10,
                accent_origin: vec2i(20, 30),
                base_code: 65,
                accent_code: -74,
            })
        );
    }

    #[test]
    fn unknown_operator() {
        assert_eq!(
            type1_glyph_metrics(&[n(0), 2], &[], Vector2I::zero()),
            Err(CharStringError::InvalidOperator)
        );
    }
}
