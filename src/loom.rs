pub(crate) use self::inner::*;

#[cfg(all(loom, test))]
mod inner {
    pub(crate) mod atomic {
        pub use loom::sync::atomic::*;
        pub use std::sync::atomic::Ordering;
    }

    pub(crate) use loom::{cell::UnsafeCell, hint, sync, thread};
    use std::{cell::RefCell, fmt::Write};

    std::thread_local! {
        static TRACE_BUF: RefCell<String> = RefCell::new(String::new());
    }

    pub(crate) fn traceln(args: std::fmt::Arguments) {
        let mut args = Some(args);
        TRACE_BUF
            .try_with(|buf| {
                let mut buf = buf.borrow_mut();
                let _ = buf.write_fmt(args.take().unwrap());
                let _ = buf.write_char('\n');
            })
            .unwrap_or_else(|_| println!("{}", args.take().unwrap()))
    }

    /// Runs `model` under `builder`, printing the trace of the failing
    /// iteration (and only that one) if the model panics.
    ///
    /// Setting `LOOM_LOG` to a `tracing_subscriber::filter::Targets` string
    /// also records loom's own `tracing` events into the trace.
    pub(crate) fn run_builder(
        builder: loom::model::Builder,
        model: impl Fn() + Sync + Send + std::panic::UnwindSafe + 'static,
    ) {
        use std::{
            env, io, panic,
            sync::atomic::{AtomicUsize, Ordering},
        };
        use tracing_subscriber::{filter::Targets, prelude::*};

        struct TraceBuf;

        impl io::Write for TraceBuf {
            fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
                TRACE_BUF.with(|buf| buf.borrow_mut().push_str(s));
                Ok(bytes.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        if let Ok(var) = env::var("LOOM_LOG") {
            match var.parse::<Targets>() {
                Ok(filter) => {
                    let _ = tracing_subscriber::fmt()
                        .with_writer(|| TraceBuf)
                        .without_time()
                        .finish()
                        .with(filter)
                        .try_init();
                }
                Err(e) => eprintln!("invalid LOOM_LOG={:?}: {}", var, e),
            }
        }

        let test_name = || {
            std::thread::current()
                .name()
                .unwrap_or("<unknown test>")
                .to_owned()
        };
        let iterations = std::sync::Arc::new(AtomicUsize::new(0));

        let result = {
            let iterations = iterations.clone();
            panic::catch_unwind(move || {
                builder.check(move || {
                    let iteration = iterations.fetch_add(1, Ordering::Relaxed) + 1;
                    traceln(format_args!(
                        "\n---- {} iteration {} ----",
                        test_name(),
                        iteration
                    ));
                    model();
                    TRACE_BUF.with(|buf| buf.borrow_mut().clear());
                })
            })
        };

        if let Err(panic) = result {
            match TRACE_BUF.try_with(|buf| buf.try_borrow().map(|buf| eprint!("{}", buf))) {
                Ok(Ok(())) => {}
                Ok(Err(_)) => eprintln!("trace buffer already borrowed"),
                Err(e) => eprintln!("trace buffer already torn down: {}", e),
            }
            eprintln!(
                "test '{}' panicked after {} iterations!",
                test_name(),
                iterations.load(Ordering::Relaxed),
            );
            panic::resume_unwind(panic);
        }
    }

    pub(crate) fn model(model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static) {
        run_builder(loom::model::Builder::default(), model)
    }

    /// Like [`model`], but bounds the number of preemptions loom explores.
    ///
    /// Models with three or more threads doing several operations each do
    /// not finish in reasonable time with an unbounded search.
    pub(crate) fn model_bounded(
        max_preemptions: usize,
        model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static,
    ) {
        let mut builder = loom::model::Builder::default();
        builder.preemption_bound = Some(max_preemptions);
        run_builder(builder, model)
    }

    pub(crate) mod alloc {
        pub(crate) use loom::alloc::Track;
    }
}

#[cfg(not(all(loom, test)))]
mod inner {
    #![allow(dead_code)]
    pub(crate) mod sync {
        #[cfg(feature = "alloc")]
        pub use alloc::sync::*;
    }

    pub(crate) use core::sync::atomic;

    // `lib.rs` links `std` for tests even without the `std` feature.
    #[cfg(any(feature = "std", test))]
    pub use std::thread;

    pub(crate) mod hint {
        #[inline(always)]
        pub(crate) fn spin_loop() {
            core::hint::spin_loop()
        }
    }

    #[derive(Debug)]
    pub(crate) struct UnsafeCell<T>(core::cell::UnsafeCell<T>);

    impl<T> UnsafeCell<T> {
        pub const fn new(data: T) -> UnsafeCell<T> {
            UnsafeCell(core::cell::UnsafeCell::new(data))
        }

        #[inline(always)]
        pub fn with<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*const T) -> R,
        {
            f(self.0.get())
        }

        #[inline(always)]
        pub fn with_mut<F, R>(&self, f: F) -> R
        where
            F: FnOnce(*mut T) -> R,
        {
            f(self.0.get())
        }
    }

    /// Without loom there is nothing to explore: run the model once, on real
    /// threads.
    #[cfg(test)]
    pub(crate) fn model(model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        model()
    }

    #[cfg(test)]
    pub(crate) fn model_bounded(
        _max_preemptions: usize,
        model: impl Fn() + std::panic::UnwindSafe + Sync + Send + 'static,
    ) {
        self::model(model)
    }

    pub(crate) mod alloc {
        /// Track allocations, detecting leaks
        #[derive(Debug, Default)]
        pub struct Track<T> {
            value: T,
        }

        impl<T> Track<T> {
            /// Track a value for leaks
            #[inline(always)]
            pub fn new(value: T) -> Track<T> {
                Track { value }
            }

            /// Get a reference to the value
            #[inline(always)]
            pub fn get_ref(&self) -> &T {
                &self.value
            }

            /// Stop tracking the value for leaks
            #[inline(always)]
            pub fn into_inner(self) -> T {
                self.value
            }
        }
    }

    #[cfg(feature = "std")]
    pub(crate) fn traceln(args: std::fmt::Arguments) {
        eprintln!("{}", args);
    }

    #[cfg(not(feature = "std"))]
    pub(crate) fn traceln(_: core::fmt::Arguments) {}
}
