use super::List;
use crate::loom::{self, alloc::Track, sync::Arc, thread};
use std::vec::Vec;

fn collect<T: Copy>(list: &List<T>) -> Vec<T> {
    let mut vals = Vec::new();
    list.for_each(|&val| vals.push(val));
    vals
}

#[test]
fn push_front_order() {
    loom::model(|| {
        let list = List::new();
        assert_dbg!(list.is_empty());

        list.push_front(1);
        list.push_front(2);
        list.push_front(3);

        assert_eq_dbg!(collect(&list), [3, 2, 1]);
        assert_eq_dbg!(list.len(), 3);
        assert_dbg!(!list.is_empty());
    })
}

#[test]
fn find_first_if() {
    loom::model(|| {
        let list = List::new();
        for i in 1..=4 {
            list.push_front(i);
        }

        assert_eq_dbg!(list.find_first_if(|&v| v % 2 == 1), Some(3));
        assert_eq_dbg!(list.find_first_if(|&v| v < 3), Some(2));
        assert_eq_dbg!(list.find_first_if(|&v| v > 4), None);

        let empty = List::<usize>::new();
        assert_eq_dbg!(empty.find_first_if(|_| true), None);
    })
}

#[test]
fn find_first_if_stops_at_match() {
    loom::model(|| {
        let list = List::new();
        for i in 1..=4 {
            list.push_front(i);
        }

        let mut tested = Vec::new();
        let found = list.find_first_if(|&v| {
            tested.push(v);
            v == 3
        });
        assert_eq_dbg!(found, Some(3));
        assert_eq_dbg!(tested, [4, 3]);
    })
}

#[test]
fn remove_if() {
    loom::model(|| {
        let list = List::new();
        for &i in &[1, 7, 2, 7, 7, 3, 7] {
            list.push_front(i);
        }

        assert_eq_dbg!(list.remove_if(|&v| v == 7), 4);
        assert_eq_dbg!(collect(&list), [3, 2, 1]);
        assert_eq_dbg!(list.find_first_if(|&v| v == 7), None);

        assert_eq_dbg!(list.remove_if(|&v| v == 7), 0);
        assert_eq_dbg!(list.remove_if(|_| true), 3);
        assert_dbg!(list.is_empty());
    })
}

#[test]
fn remove_if_drops_removed() {
    loom::model(|| {
        let list = List::new();
        for i in 0..4 {
            list.push_front(Track::new(i));
        }

        // loom reports any `Track` that is never dropped.
        assert_eq_dbg!(list.remove_if(|v| v.get_ref() % 2 == 0), 2);

        let mut vals = Vec::new();
        list.for_each(|v| vals.push(*v.get_ref()));
        assert_eq_dbg!(vals, [3, 1]);
    })
}

#[test]
fn concurrent_push_front() {
    loom::model(|| {
        let list = Arc::new(List::new());

        let threads = (1..=2)
            .map(|i| {
                let list = list.clone();
                thread::spawn(move || list.push_front(i))
            })
            .collect::<Vec<_>>();
        list.push_front(3);

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq_dbg!(list.len(), 3);
        let mut vals = collect(&list);
        vals.sort_unstable();
        assert_eq_dbg!(vals, [1, 2, 3]);
    })
}

#[test]
fn push_front_during_for_each() {
    loom::model(|| {
        let list = Arc::new(List::new());
        list.push_front(1);
        list.push_front(2);

        let pusher = {
            let list = list.clone();
            thread::spawn(move || list.push_front(3))
        };

        let seen = collect(&list);
        test_dbg!(&seen);
        // the new value is either seen first, or not at all
        assert_dbg!(seen == [2, 1] || seen == [3, 2, 1], "saw {:?}", seen);

        pusher.join().unwrap();
        assert_eq_dbg!(collect(&list), [3, 2, 1]);
    })
}

#[test]
fn remove_if_during_for_each() {
    loom::model(|| {
        let list = Arc::new(List::new());
        for i in 1..=3 {
            list.push_front(i);
        }

        let remover = {
            let list = list.clone();
            thread::spawn(move || list.remove_if(|&v| v == 2))
        };

        let seen = collect(&list);
        test_dbg!(&seen);
        // values that are never removed are always seen, in order
        assert_dbg!(seen == [3, 2, 1] || seen == [3, 1], "saw {:?}", seen);

        assert_eq_dbg!(remover.join().unwrap(), 1);
        assert_eq_dbg!(collect(&list), [3, 1]);
    })
}

#[test]
fn concurrent_remove_if() {
    loom::model(|| {
        let list = Arc::new(List::new());
        for i in 1..=4 {
            list.push_front(i);
        }

        let evens = {
            let list = list.clone();
            thread::spawn(move || list.remove_if(|&v| v % 2 == 0))
        };
        let threes = list.remove_if(|&v| v == 3);

        assert_eq_dbg!(evens.join().unwrap(), 2);
        assert_eq_dbg!(threes, 1);
        assert_eq_dbg!(collect(&list), [1]);
    })
}

#[test]
fn push_front_during_remove_if() {
    loom::model_bounded(3, || {
        let list = Arc::new(List::new());
        list.push_front(Track::new(1));
        list.push_front(Track::new(2));

        let pusher = {
            let list = list.clone();
            thread::spawn(move || list.push_front(Track::new(3)))
        };
        let removed = list.remove_if(|v| *v.get_ref() == 2);
        pusher.join().unwrap();

        assert_eq_dbg!(removed, 1);
        let mut vals = Vec::new();
        list.for_each(|v| vals.push(*v.get_ref()));
        assert_eq_dbg!(vals, [3, 1]);
    })
}

#[test]
#[cfg(not(loom))]
fn panicking_callback_releases_locks() {
    use std::panic::{self, AssertUnwindSafe};

    let list = List::new();
    for i in 0..3 {
        list.push_front(i);
    }

    let visited = panic::catch_unwind(AssertUnwindSafe(|| {
        list.for_each(|&v| {
            if v == 1 {
                panic!("visitor panicked");
            }
        })
    }));
    assert_dbg!(visited.is_err());

    let removed = panic::catch_unwind(AssertUnwindSafe(|| {
        list.remove_if(|&v| {
            if v == 0 {
                panic!("predicate panicked");
            }
            v == 2
        })
    }));
    assert_dbg!(removed.is_err());

    // both node locks held at each panic were released
    assert_eq_dbg!(collect(&list), [1, 0]);
    list.push_front(3);
    assert_eq_dbg!(list.remove_if(|_| true), 3);
    assert_dbg!(list.is_empty());
}
