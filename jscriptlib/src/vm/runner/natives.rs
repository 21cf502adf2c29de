//! `Gfx.*` natives, routed to the graphics capability.

use tracing::debug;

use crate::bytecode::Value;
use crate::types::VOID_POINTEE;
use crate::vm::{DrawRect, GraphicsSlot, Vm, VmError, VmErrorKind};

impl Vm<'_> {
    pub(super) fn call_native(
        &mut self,
        native: &str,
        args: Vec<Value>,
        function_name: &str,
        ip: usize,
    ) -> Result<(), VmError> {
        let expected = match native {
            "Init" => 3,
            "DrawRect" => 7,
            "RunLoop" | "GetLayer" | "GetDevice" => 0,
            _ => {
                return Err(super::err_at(
                    VmErrorKind::UnknownFunction,
                    format!("Unknown native 'Gfx.{native}'"),
                    function_name,
                    ip,
                ));
            }
        };
        if args.len() != expected {
            return Err(super::err_at(
                VmErrorKind::ArityMismatch,
                format!("'Gfx.{native}' expects {expected} arguments, got {}", args.len()),
                function_name,
                ip,
            ));
        }
        let site = |e: VmError| super::err_at(e.kind, e.message, function_name, ip);

        match native {
            "Init" => {
                let (Some(width), Some(height), Some(title)) =
                    (args[0].as_i64(), args[1].as_i64(), args[2].as_str())
                else {
                    return Err(super::err_at(
                        VmErrorKind::TypeMismatch,
                        "'Gfx.Init' expects (int, int, string)",
                        function_name,
                        ip,
                    ));
                };
                match &mut self.graphics {
                    GraphicsSlot::Ready(backend) => {
                        debug!(width, height, title, "graphics init");
                        backend.init(width, height, title).map_err(site)
                    }
                    GraphicsSlot::Looping { .. } => Err(unavailable(native, true, function_name, ip)),
                    GraphicsSlot::Absent => Err(unavailable(native, false, function_name, ip)),
                }
            }
            "DrawRect" => {
                let mut n = [0.0f64; 7];
                for (slot, arg) in n.iter_mut().zip(&args) {
                    let Some(v) = arg.as_f64() else {
                        return Err(super::err_at(
                            VmErrorKind::TypeMismatch,
                            format!("'Gfx.DrawRect' expects numbers, got '{}'", arg.kind()),
                            function_name,
                            ip,
                        ));
                    };
                    *slot = v;
                }
                let [x, y, width, height, r, g, b] = n;
                let rect = DrawRect {
                    x,
                    y,
                    width,
                    height,
                    r,
                    g,
                    b,
                };
                match &mut self.graphics {
                    GraphicsSlot::Ready(backend) => backend.draw_rect(rect).map_err(site),
                    GraphicsSlot::Looping { pending, .. } => {
                        pending.push(rect);
                        Ok(())
                    }
                    GraphicsSlot::Absent => Err(unavailable(native, false, function_name, ip)),
                }
            }
            "RunLoop" => {
                let backend = match std::mem::replace(&mut self.graphics, GraphicsSlot::Absent) {
                    GraphicsSlot::Ready(backend) => backend,
                    other => {
                        let looping = matches!(other, GraphicsSlot::Looping { .. });
                        self.graphics = other;
                        return Err(unavailable(native, looping, function_name, ip));
                    }
                };
                self.graphics = GraphicsSlot::Looping {
                    layer: backend.layer_ptr(),
                    device: backend.device_ptr(),
                    pending: Vec::new(),
                };
                debug!("graphics loop entered");
                let result = backend.run_loop(self);
                self.graphics = GraphicsSlot::Ready(backend);
                debug!("graphics loop exited");
                result.map_err(site)
            }
            _ => {
                let addr = match (&self.graphics, native) {
                    (GraphicsSlot::Ready(backend), "GetLayer") => backend.layer_ptr(),
                    (GraphicsSlot::Ready(backend), _) => backend.device_ptr(),
                    (GraphicsSlot::Looping { layer, .. }, "GetLayer") => *layer,
                    (GraphicsSlot::Looping { device, .. }, _) => *device,
                    (GraphicsSlot::Absent, _) => {
                        return Err(unavailable(native, false, function_name, ip));
                    }
                };
                self.stack.push(Value::pointer(addr, VOID_POINTEE));
                Ok(())
            }
        }
    }
}

fn unavailable(native: &str, looping: bool, function_name: &str, ip: usize) -> VmError {
    let message = if looping {
        format!("'Gfx.{native}' cannot be called while the render loop is running")
    } else {
        format!("'Gfx.{native}' requires a graphics capability")
    };
    super::err_at(VmErrorKind::CapabilityMissing, message, function_name, ip)
}
