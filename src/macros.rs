macro_rules! test_println {
    ($($arg:tt)*) => {
        #[cfg(all(feature = "std", any(chainlink_trace, test)))]
        if crate::util::panic::panicking() {
            // getting the thread ID while panicking doesn't seem to play super nicely with loom's
            // mock lazy_static...
            println!("[PANIC {:>30}:{:<3}] {}", file!(), line!(), format_args!($($arg)*))
        } else {
            crate::loom::traceln(format_args!(
                "[{:?} {:>30}:{:<3}] {}",
                crate::loom::thread::current().id(),
                file!(),
                line!(),
                format_args!($($arg)*),
            ));
        }
    }
}

macro_rules! test_dbg {
    ($e:expr) => {
        match $e {
            e => {
                #[cfg(all(feature = "std", any(chainlink_trace, test)))]
                test_println!("{} = {:?}", stringify!($e), &e);
                e
            }
        }
    };
}

#[cfg(test)]
macro_rules! assert_dbg {
    ($e:expr) => {
        assert_dbg!(@ $e, "")
    };
    ($e:expr, $($msg:tt)+) => {
        assert_dbg!(@ $e, " ({})", format_args!($($msg)+))
    };
    (@$e:expr, $($msg:tt)+) => {
        {
            #[cfg(all(feature = "std", any(chainlink_trace, test)))]
            test_println!("ASSERT: {}{}", stringify!($e), format_args!($($msg)*));
            assert!($e, $($msg)*);
            test_println!("-> ok");
        }
    }
}

#[cfg(test)]
macro_rules! assert_eq_dbg {
    ($a:expr, $b:expr) => {
        assert_eq_dbg!(@ $a, $b, "")
    };
    ($a:expr, $b:expr, $($msg:tt)+) => {
       assert_eq_dbg!(@ $a, $b, " ({})", format_args!($($msg)+))
    };
    (@ $a:expr, $b:expr, $($msg:tt)+) => {
        {
            #[cfg(all(feature = "std", any(chainlink_trace, test)))]
            test_println!("ASSERT: {} == {}{}", stringify!($a), stringify!($b), format_args!($($msg)*));
            assert_eq!($a, $b, $($msg)*);
            test_println!("-> ok");
        }
    }
}

macro_rules! feature {
    (
        #![$meta:meta]
        $($item:item)*
    ) => {
        $(
            #[cfg($meta)]
            #[cfg_attr(docsrs, doc(cfg($meta)))]
            $item
        )*
    }
}
